//! Scale subresource access for arbitrary scale targets
//!
//! A scale target is only known by its `apiVersion` and `kind`, so the
//! matching API resource is looked up through discovery before the scale
//! subresource can be read or replaced.

use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v1::{CrossVersionObjectReference, Scale};
use kube::api::{Api, ApiResource, DynamicObject, PostParams};
use kube::{Client, discovery};
use tracing::debug;

use crate::controller::collaborators::ScaleClient;
use crate::controller::error::{Error, Result};

/// API group, version and kind of a scale target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetResource {
    /// API group, empty for the core group
    pub group: String,
    /// API version, empty when the reference does not pin one
    pub version: String,
    pub kind: String,
}

impl TargetResource {
    /// Derive the target resource from a scale target reference
    pub fn from_reference(reference: &CrossVersionObjectReference) -> Result<Self> {
        let (group, version) = parse_group_version(reference.api_version.as_deref().unwrap_or(""))?;
        Ok(Self {
            group,
            version,
            kind: reference.kind.clone(),
        })
    }
}

/// Split an `apiVersion` string into group and version
///
/// `""` yields an empty group and version, `v1` is the core group, and
/// `group/version` is split at the slash.
pub fn parse_group_version(api_version: &str) -> Result<(String, String)> {
    if api_version.is_empty() {
        return Ok((String::new(), String::new()));
    }

    let parts: Vec<&str> = api_version.split('/').collect();
    match parts.as_slice() {
        [version] => Ok((String::new(), version.to_string())),
        [group, version] => Ok((group.to_string(), version.to_string())),
        _ => Err(Error::ValidationError(format!(
            "unexpected GroupVersion string: {}",
            api_version
        ))),
    }
}

/// Scale client backed by API discovery and the dynamic API
#[derive(Clone)]
pub struct KubeScaleClient {
    client: Client,
}

impl KubeScaleClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn resolve(&self, target: &TargetResource) -> Result<ApiResource> {
        let group = discovery::group(&self.client, &target.group).await?;
        let resources = if target.version.is_empty() {
            group.recommended_resources()
        } else {
            group.versioned_resources(&target.version)
        };

        let (resource, _caps) = resources
            .into_iter()
            .find(|(ar, _)| ar.kind == target.kind)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "kind {} is not served by API group {:?}",
                    target.kind, target.group
                ))
            })?;

        debug!(
            "Resolved scale target {} to resource {}",
            target.kind, resource.plural
        );
        Ok(resource)
    }

    async fn api(&self, namespace: &str, target: &TargetResource) -> Result<Api<DynamicObject>> {
        let resource = self.resolve(target).await?;
        Ok(Api::namespaced_with(self.client.clone(), namespace, &resource))
    }
}

#[async_trait]
impl ScaleClient for KubeScaleClient {
    async fn get_scale(
        &self,
        namespace: &str,
        target: &TargetResource,
        name: &str,
    ) -> Result<Scale> {
        let api = self.api(namespace, target).await?;
        Ok(api.get_scale(name).await?)
    }

    async fn update_scale(
        &self,
        namespace: &str,
        target: &TargetResource,
        scale: &Scale,
    ) -> Result<Scale> {
        let name = scale
            .metadata
            .name
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;

        let api = self.api(namespace, target).await?;
        // The fetched resourceVersion is sent back, so a concurrent writer surfaces as a 409
        let data = serde_json::to_vec(scale)?;
        Ok(api.replace_scale(name, &PostParams::default(), data).await?)
    }
}
