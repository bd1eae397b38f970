//! Cleanup of orphaned agent Pods
//!
//! Renaming the Pod in a CustomPodAutoscaler's template leaves the old Pod
//! running next to the new one. Each reconcile lists the Pods labelled as
//! owned by the autoscaler and deletes every one that is not the currently
//! desired Pod.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

use crate::controller::collaborators::PodCleanup;
use crate::controller::error::Result;
use crate::crd::CustomPodAutoscaler;
use crate::resources::OWNED_BY_LABEL;
use crate::resources::common::owned_by_selector;
use crate::resources::pod::desired_pod_name;

/// Select the Pods that belong to `owner` but are not named `desired`
///
/// The owned-by label is checked again here rather than trusting the list
/// selector, so a Pod without the matching label is never selected.
pub fn stale_pods<'a>(pods: &'a [Pod], owner: &str, desired: &str) -> Vec<&'a Pod> {
    pods.iter()
        .filter(|pod| pod.labels().get(OWNED_BY_LABEL).map(String::as_str) == Some(owner))
        .filter(|pod| pod.name_any() != desired)
        .collect()
}

/// Pod cleanup backed by the API server
#[derive(Clone)]
pub struct KubePodCleanup {
    client: Client,
}

impl KubePodCleanup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodCleanup for KubePodCleanup {
    async fn cleanup(&self, owner: &CustomPodAutoscaler) -> Result<()> {
        let ns = owner.namespace().unwrap_or_default();
        let owner_name = owner.name_any();
        let desired = desired_pod_name(owner);

        let api: Api<Pod> = Api::namespaced(self.client.clone(), &ns);
        let pods = api
            .list(&ListParams::default().labels(&owned_by_selector(&owner_name)))
            .await?;

        let stale = stale_pods(&pods.items, &owner_name, &desired);
        if stale.is_empty() {
            debug!("No orphaned Pods for {}/{}", ns, owner_name);
            return Ok(());
        }

        for pod in stale {
            let name = pod.name_any();
            api.delete(&name, &DeleteParams::default()).await?;
            info!("Deleted orphaned Pod {}/{} (desired: {})", ns, name, desired);
        }

        Ok(())
    }
}
