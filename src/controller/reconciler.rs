//! Reconciliation logic for CustomPodAutoscaler resources
//!
//! Each reconcile either pauses the autoscaler (see [`super::pause`]) or
//! provisions its agent: ServiceAccount, Role and RoleBinding in that order,
//! then the agent Pod, then removal of Pods left over from an earlier
//! template. Every step returns early on error, leaving later steps for the
//! next attempt.

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::controller::cleanup::KubePodCleanup;
use crate::controller::collaborators::{
    AutoscalerStore, Dependent, ObjectReconciler, PodCleanup, ScaleClient,
};
use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::object_reconciler::KubeObjectReconciler;
use crate::controller::pause::paused_replicas;
use crate::controller::scale::KubeScaleClient;
use crate::controller::store::KubeAutoscalerStore;
use crate::crd::{CustomPodAutoscaler, Provisioning};
use crate::resources::{pod, rbac};

/// What a reconcile did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The autoscaler no longer exists or is being deleted
    Skipped,
    /// The autoscaler was removed and its target pinned to this replica count
    Paused(i32),
    /// Dependents were converged; carries the agent Pod's requeue action
    Provisioned(Action),
}

impl Outcome {
    pub fn action(&self) -> Action {
        match self {
            Outcome::Provisioned(action) => action.clone(),
            Outcome::Skipped | Outcome::Paused(_) => Action::await_change(),
        }
    }
}

/// Converges the dependents of CustomPodAutoscalers
///
/// Holds no state besides its collaborators, so one instance serves
/// concurrent reconciles of different autoscalers.
#[derive(Clone)]
pub struct CustomPodAutoscalerReconciler {
    pub(crate) store: Arc<dyn AutoscalerStore>,
    pub(crate) objects: Arc<dyn ObjectReconciler>,
    pub(crate) cleanup: Arc<dyn PodCleanup>,
    pub(crate) scaling: Arc<dyn ScaleClient>,
}

impl CustomPodAutoscalerReconciler {
    pub fn new(
        store: Arc<dyn AutoscalerStore>,
        objects: Arc<dyn ObjectReconciler>,
        cleanup: Arc<dyn PodCleanup>,
        scaling: Arc<dyn ScaleClient>,
    ) -> Self {
        Self {
            store,
            objects,
            cleanup,
            scaling,
        }
    }

    /// Build a reconciler whose collaborators all talk to the given cluster
    pub fn from_client(client: Client) -> Self {
        Self::new(
            Arc::new(KubeAutoscalerStore::new(client.clone())),
            Arc::new(KubeObjectReconciler::new(client.clone())),
            Arc::new(KubePodCleanup::new(client.clone())),
            Arc::new(KubeScaleClient::new(client)),
        )
    }

    /// Reconcile the CustomPodAutoscaler identified by namespace and name
    #[instrument(skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome> {
        let Some(cpa) = self.store.get(namespace, name).await? else {
            // Dependents are garbage collected through their owner references
            debug!("CustomPodAutoscaler no longer exists");
            return Ok(Outcome::Skipped);
        };

        if cpa.metadata.deletion_timestamp.is_some() {
            info!("CustomPodAutoscaler marked for deletion, ignoring reconciliation of dependencies");
            return Ok(Outcome::Skipped);
        }

        if let Some(raw) = paused_replicas(&cpa) {
            return self.pause(&cpa, raw).await;
        }

        self.provision(&cpa).await
    }

    async fn provision(&self, cpa: &CustomPodAutoscaler) -> Result<Outcome> {
        let provisioning = cpa.spec.provisioning();

        let scale_target_ref = serde_json::to_string(&cpa.spec.scale_target_ref)?;

        let service_account = rbac::resolve_service_account(cpa, provisioning.service_account)?;
        let service_account_name = service_account.name_any();

        if provisioning.service_account {
            self.provision_identity(cpa, service_account, &provisioning)
                .await?;
        }

        let agent = pod::generate_agent_pod(cpa, &scale_target_ref, &service_account_name);
        let action = self
            .objects
            .reconcile(cpa, Dependent::Pod(agent), provisioning.pod, false)
            .await?;

        self.cleanup.cleanup(cpa).await?;

        info!("Provisioned autoscaler agent");
        Ok(Outcome::Provisioned(action))
    }

    /// Converge ServiceAccount, Role and RoleBinding, strictly in that order
    async fn provision_identity(
        &self,
        cpa: &CustomPodAutoscaler,
        service_account: k8s_openapi::api::core::v1::ServiceAccount,
        provisioning: &Provisioning,
    ) -> Result<()> {
        self.objects
            .reconcile(
                cpa,
                Dependent::ServiceAccount(service_account),
                provisioning.service_account,
                true,
            )
            .await?;

        let role = rbac::generate_role(cpa, provisioning);
        self.objects
            .reconcile(cpa, Dependent::Role(role), provisioning.role, true)
            .await?;

        let role_binding = rbac::generate_role_binding(cpa);
        self.objects
            .reconcile(
                cpa,
                Dependent::RoleBinding(role_binding),
                provisioning.role_binding,
                true,
            )
            .await?;

        Ok(())
    }
}

/// Main reconciliation function, driven by the kube-runtime controller
pub async fn reconcile(cpa: Arc<CustomPodAutoscaler>, ctx: Arc<Context>) -> Result<Action> {
    let ns = cpa
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = cpa.name_any();
    let started = Instant::now();

    let result = ctx.reconciler.reconcile(&ns, &name).await;

    if let Some(health) = &ctx.health_state {
        let metrics = &health.metrics;
        match &result {
            Ok(outcome) => {
                metrics.record_reconcile(&ns, &name, started.elapsed().as_secs_f64());
                health.mark_reconciled();
                if let Outcome::Paused(_) = outcome {
                    metrics.record_pause(&ns, &name);
                }
            }
            Err(_) => metrics.record_error(&ns, &name),
        }
    }

    result.map(|outcome| outcome.action())
}

/// Error policy for the controller
///
/// Retryable errors are requeued after a short jittered delay, permanent
/// ones after the maximum delay. Fatal errors wait for the next change.
pub fn error_policy(cpa: Arc<CustomPodAutoscaler>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = cpa.name_any();

    if error.is_fatal() {
        error!("Fatal error for {}: {:?}, waiting for a spec change", name, error);
        return Action::await_change();
    }

    let delay = BackoffConfig::default().delay_for_error(error);
    if error.is_retryable() {
        warn!(
            "Retryable error for {}: {:?}, requeuing in {:?}",
            name, error, delay
        );
    } else {
        error!(
            "Non-retryable error for {}: {:?}, requeuing in {:?} for manual intervention",
            name, error, delay
        );
    }

    Action::requeue(delay)
}
