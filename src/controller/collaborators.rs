//! Seams between the reconciler and the cluster
//!
//! The reconciler only talks to the cluster through these traits. The
//! kube-backed implementations live next to this module; tests drive the
//! reconciler with in-memory ones.

use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::ResourceExt;
use kube::runtime::controller::Action;

use crate::controller::error::Result;
use crate::controller::scale::TargetResource;
use crate::crd::CustomPodAutoscaler;

/// A desired object generated for a CustomPodAutoscaler
#[derive(Clone, Debug)]
pub enum Dependent {
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    Pod(Pod),
}

impl Dependent {
    /// Human readable kind, used in logs
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Dependent::ServiceAccount(_) => "v1/ServiceAccount",
            Dependent::Role(_) => "v1/Role",
            Dependent::RoleBinding(_) => "v1/RoleBinding",
            Dependent::Pod(_) => "v1/Pod",
        }
    }

    pub fn name(&self) -> String {
        match self {
            Dependent::ServiceAccount(o) => o.name_any(),
            Dependent::Role(o) => o.name_any(),
            Dependent::RoleBinding(o) => o.name_any(),
            Dependent::Pod(o) => o.name_any(),
        }
    }
}

/// Read and delete access to CustomPodAutoscaler objects
#[async_trait]
pub trait AutoscalerStore: Send + Sync {
    /// Fetch an autoscaler, `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CustomPodAutoscaler>>;

    /// Delete an autoscaler; its dependents are garbage collected by the cluster
    async fn delete(&self, cpa: &CustomPodAutoscaler) -> Result<()>;
}

/// Converges one desired object against the cluster
///
/// Creates the object when it is absent and `should_provision` is set,
/// updates it when present, provisioned and `updateable`, and otherwise
/// leaves it alone. Repeating a call with the same input must not write.
#[async_trait]
pub trait ObjectReconciler: Send + Sync {
    async fn reconcile(
        &self,
        owner: &CustomPodAutoscaler,
        desired: Dependent,
        should_provision: bool,
        updateable: bool,
    ) -> Result<Action>;
}

/// Removes agent Pods left behind by an earlier template
#[async_trait]
pub trait PodCleanup: Send + Sync {
    /// Delete Pods owned by `owner` that are not the currently desired Pod
    async fn cleanup(&self, owner: &CustomPodAutoscaler) -> Result<()>;
}

/// Access to the scale subresource of arbitrary workloads
#[async_trait]
pub trait ScaleClient: Send + Sync {
    async fn get_scale(&self, namespace: &str, target: &TargetResource, name: &str)
    -> Result<Scale>;

    async fn update_scale(
        &self,
        namespace: &str,
        target: &TargetResource,
        scale: &Scale,
    ) -> Result<Scale>;
}
