use k8s_openapi::api::autoscaling::v1::CrossVersionObjectReference;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CustomPodAutoscaler declares an autoscaling agent and the workload it manages
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "custompodautoscaler.com",
    version = "v1",
    kind = "CustomPodAutoscaler",
    plural = "custompodautoscalers",
    shortname = "cpa",
    namespaced,
    printcolumn = r#"{"name":"Target Kind", "type":"string", "jsonPath":".spec.scaleTargetRef.kind"}"#,
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.scaleTargetRef.name"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CustomPodAutoscalerSpec {
    /// Workload the autoscaler manages
    pub scale_target_ref: CrossVersionObjectReference,

    /// Pod template the autoscaler agent runs from
    pub template: PodTemplateSpec,

    /// Image of the autoscaler agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Pull policy for the autoscaler agent image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,

    /// Configuration delivered to every agent container as environment variables, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<CustomPodAutoscalerConfig>,

    /// Provision a ServiceAccount for the agent (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_service_account: Option<bool>,

    /// Provision a Role for the agent (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_role: Option<bool>,

    /// Provision a RoleBinding for the agent (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_role_binding: Option<bool>,

    /// Provision the agent Pod (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_pod: Option<bool>,

    /// Grant the agent access to the metrics APIs (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_requires_metrics_server: Option<bool>,

    /// Grant the agent access to Argo Rollouts (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_requires_argo_rollouts: Option<bool>,
}

/// A single configuration option, delivered verbatim as an environment variable
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct CustomPodAutoscalerConfig {
    pub name: String,
    pub value: String,
}

/// Provisioning toggles with their defaults applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Provisioning {
    pub service_account: bool,
    pub role: bool,
    pub role_binding: bool,
    pub pod: bool,
    pub metrics_server: bool,
    pub argo_rollouts: bool,
}

impl Default for Provisioning {
    fn default() -> Self {
        Self {
            service_account: true,
            role: true,
            role_binding: true,
            pod: true,
            metrics_server: false,
            argo_rollouts: false,
        }
    }
}

impl CustomPodAutoscalerSpec {
    /// Resolve the tri-state toggles, substituting defaults for unset values
    pub fn provisioning(&self) -> Provisioning {
        let defaults = Provisioning::default();
        Provisioning {
            service_account: self
                .provision_service_account
                .unwrap_or(defaults.service_account),
            role: self.provision_role.unwrap_or(defaults.role),
            role_binding: self.provision_role_binding.unwrap_or(defaults.role_binding),
            pod: self.provision_pod.unwrap_or(defaults.pod),
            metrics_server: self
                .role_requires_metrics_server
                .unwrap_or(defaults.metrics_server),
            argo_rollouts: self
                .role_requires_argo_rollouts
                .unwrap_or(defaults.argo_rollouts),
        }
    }
}
