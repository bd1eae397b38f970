//! Create-or-update-or-skip convergence of generated objects
//!
//! The decision is made by [`plan_convergence`] from the live object, the
//! desired object and the two flags. An update is only issued when the live
//! object does not already contain every field of the desired one, which
//! keeps repeated reconciles free of writes.

use std::fmt::Debug;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::controller::collaborators::{Dependent, ObjectReconciler};
use crate::controller::error::Result;
use crate::crd::CustomPodAutoscaler;
use crate::resources::FIELD_MANAGER;

/// Outcome of comparing a desired object with the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convergence {
    Create,
    Update,
    Skip,
}

/// Decide how to converge a desired object
pub fn plan_convergence(
    live: Option<&Value>,
    desired: &Value,
    should_provision: bool,
    updateable: bool,
) -> Convergence {
    match live {
        None if should_provision => Convergence::Create,
        Some(live) if should_provision && updateable && !json_contains(live, desired) => {
            Convergence::Update
        }
        _ => Convergence::Skip,
    }
}

/// Check whether every field set in `desired` has the same value in `live`
///
/// Objects are compared key by key, so server-populated fields on the live
/// object are ignored. Arrays must match element for element.
pub fn json_contains(live: &Value, desired: &Value) -> bool {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => desired
            .iter()
            .all(|(key, value)| live.get(key).is_some_and(|l| json_contains(l, value))),
        (Value::Array(live), Value::Array(desired)) => {
            live.len() == desired.len()
                && live.iter().zip(desired).all(|(l, d)| json_contains(l, d))
        }
        _ => live == desired,
    }
}

/// Object reconciler backed by the API server
#[derive(Clone)]
pub struct KubeObjectReconciler {
    client: Client,
}

impl KubeObjectReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn converge<K>(
        &self,
        ns: &str,
        desired: &K,
        kind: &str,
        should_provision: bool,
        updateable: bool,
    ) -> Result<Action>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let ns = desired.namespace().unwrap_or_else(|| ns.to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &ns);
        let name = desired.name_any();

        let live = api.get_opt(&name).await?;
        let live = live.as_ref().map(serde_json::to_value).transpose()?;
        let desired_json = serde_json::to_value(desired)?;

        match plan_convergence(live.as_ref(), &desired_json, should_provision, updateable) {
            Convergence::Create => {
                let params = PostParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                };
                api.create(&params, desired).await?;
                info!("Created {} {}/{}", kind, ns, name);
            }
            Convergence::Update => {
                let params = PatchParams::apply(FIELD_MANAGER).force();
                api.patch(&name, &params, &Patch::Apply(desired)).await?;
                info!("Updated {} {}/{}", kind, ns, name);
            }
            Convergence::Skip => {
                debug!(
                    "Skipping {} {}/{} (provision: {}, updateable: {})",
                    kind, ns, name, should_provision, updateable
                );
            }
        }

        Ok(Action::await_change())
    }
}

#[async_trait]
impl ObjectReconciler for KubeObjectReconciler {
    async fn reconcile(
        &self,
        owner: &CustomPodAutoscaler,
        desired: Dependent,
        should_provision: bool,
        updateable: bool,
    ) -> Result<Action> {
        let ns = owner.namespace().unwrap_or_default();
        let kind = desired.kind_tag();

        match &desired {
            Dependent::ServiceAccount(sa) => {
                self.converge(&ns, sa, kind, should_provision, updateable)
                    .await
            }
            Dependent::Role(role) => {
                self.converge(&ns, role, kind, should_provision, updateable)
                    .await
            }
            Dependent::RoleBinding(binding) => {
                self.converge(&ns, binding, kind, should_provision, updateable)
                    .await
            }
            Dependent::Pod(pod) => {
                self.converge(&ns, pod, kind, should_provision, updateable)
                    .await
            }
        }
    }
}
