use std::sync::Arc;

use kube::Client;

use crate::controller::reconciler::CustomPodAutoscalerReconciler;
use crate::health::HealthState;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Control loop and its cluster collaborators
    pub reconciler: CustomPodAutoscalerReconciler,
    /// Health state for recording metrics
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    pub fn new(client: Client, health_state: Option<Arc<HealthState>>) -> Self {
        Self::with_reconciler(CustomPodAutoscalerReconciler::from_client(client), health_state)
    }

    /// Create a context around an already assembled reconciler
    pub fn with_reconciler(
        reconciler: CustomPodAutoscalerReconciler,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            reconciler,
            health_state,
        }
    }
}
