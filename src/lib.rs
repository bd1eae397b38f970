pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;

pub use config::{ConfigError, OperatorConfig};
pub use controller::{
    BackoffConfig, Context, CustomPodAutoscalerReconciler, Error, Outcome, Result, error_policy,
    reconcile,
};
pub use crd::CustomPodAutoscaler;
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::controller::Error as ControllerError;
use kube::runtime::{Controller, WatchStreamExt, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

use crate::controller::filter::{ObjectRole, filter_events};
use crate::resources::OWNED_BY_LABEL;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Watch objects carrying the owned-by label, passing on only their deletion
fn dependent_deletions<T>(
    client: Client,
    namespace: Option<&str>,
) -> impl Stream<Item = std::result::Result<T, watcher::Error>> + Send + use<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + 'static,
    <T as Resource>::DynamicType: Default,
{
    let api: Api<T> = scoped_api(client, namespace);
    let config = WatcherConfig::default().labels(OWNED_BY_LABEL);
    filter_events(watcher(api, config).default_backoff(), ObjectRole::Secondary)
}

/// Whether a controller error only means the autoscaler was gone by the time
/// its reconcile ran
///
/// Deleting an autoscaler emits a delete for it and for each garbage-collected
/// dependent. Those triggers find nothing in the store, or a 404 on the fetch.
pub fn is_stale_trigger(error: &ControllerError<Error, watcher::Error>) -> bool {
    match error {
        ControllerError::ObjectNotFound(_) => true,
        ControllerError::ReconcilerFailed(err, _) => err.is_not_found(),
        _ => false,
    }
}

/// Run the operator controller (cluster-wide).
///
/// Watches CustomPodAutoscaler resources and the objects provisioned for
/// them. If health_state is provided, metrics will be recorded for
/// reconciliations.
pub async fn run_controller(client: Client, health_state: Option<Arc<HealthState>>) {
    run_controller_scoped(client, health_state, None).await
}

/// Run the operator controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
///
/// Every change to an autoscaler triggers a reconcile. Owned Pods,
/// ServiceAccounts, Roles and RoleBindings only trigger one when deleted,
/// so a removed dependent is recreated without the operator's own writes
/// requeueing the autoscaler.
pub async fn run_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for CustomPodAutoscaler resources (scope: {})",
        scope_msg
    );

    // Mark as ready once we start the controller
    if let Some(ref state) = health_state {
        state.set_ready(true);
    }

    let ctx = Arc::new(Context::new(client.clone(), health_state));

    let autoscalers: Api<CustomPodAutoscaler> = scoped_api(client.clone(), namespace);
    let (reader, writer) = reflector::store();
    let autoscaler_events = watcher(autoscalers, WatcherConfig::default())
        .default_backoff()
        .reflect(writer);

    Controller::for_stream(
        filter_events(autoscaler_events, ObjectRole::Primary),
        reader,
    )
    .owns_stream(dependent_deletions::<Pod>(client.clone(), namespace))
    .owns_stream(dependent_deletions::<ServiceAccount>(client.clone(), namespace))
    .owns_stream(dependent_deletions::<Role>(client.clone(), namespace))
    .owns_stream(dependent_deletions::<RoleBinding>(client.clone(), namespace))
    .run(reconcile, error_policy, ctx)
    .for_each(|result| async move {
        match result {
            Ok((obj, _action)) => {
                tracing::debug!("Reconciled: {}", obj.name);
            }
            Err(e) => {
                if is_stale_trigger(&e) {
                    tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                } else {
                    tracing::error!("Reconciliation error: {:?}", e);
                }
            }
        }
    })
    .await;

    // This should never complete in normal operation
    tracing::error!("Controller stream ended unexpectedly");
}
