//! Autoscaler agent Pod generation
//!
//! The agent Pod is built from the CustomPodAutoscaler's template. The
//! operator only adds what the agent needs to find its target: ownership
//! labels, a ServiceAccount, and a set of environment variables appended to
//! every container.

use k8s_openapi::api::core::v1::{EnvVar, Pod};
use kube::ResourceExt;

use crate::crd::{CustomPodAutoscaler, CustomPodAutoscalerConfig};
use crate::resources::common::{owner_reference, standard_labels};

/// Environment variable carrying the serialized scale target reference
pub const SCALE_TARGET_REF_ENV: &str = "scaleTargetRef";

/// Environment variable carrying the autoscaler's namespace
pub const NAMESPACE_ENV: &str = "namespace";

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Environment variables injected into every agent container
///
/// Order is fixed: scale target, namespace, then the configured options in
/// declared order. Duplicate option names are kept.
pub fn agent_env_vars(cpa: &CustomPodAutoscaler, scale_target_ref: &str) -> Vec<EnvVar> {
    let ns = cpa.namespace().unwrap_or_default();
    let mut env = vec![
        env_var(SCALE_TARGET_REF_ENV, scale_target_ref),
        env_var(NAMESPACE_ENV, &ns),
    ];
    env.extend(config_env_vars(&cpa.spec.config));
    env
}

/// Convert configuration options to environment variables
pub fn config_env_vars(config: &[CustomPodAutoscalerConfig]) -> Vec<EnvVar> {
    config
        .iter()
        .map(|option| env_var(&option.name, &option.value))
        .collect()
}

/// Name of the agent Pod: the template's name, or the autoscaler's when blank
pub fn desired_pod_name(cpa: &CustomPodAutoscaler) -> String {
    cpa.spec
        .template
        .metadata
        .as_ref()
        .and_then(|meta| meta.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| cpa.name_any())
}

/// Generate the agent Pod
///
/// Template labels are kept, the ownership labels override any template
/// label with the same key. A blank name or namespace falls back to the
/// autoscaler's.
pub fn generate_agent_pod(
    cpa: &CustomPodAutoscaler,
    scale_target_ref: &str,
    service_account_name: &str,
) -> Pod {
    let cpa_name = cpa.name_any();
    let template = &cpa.spec.template;

    let mut metadata = template.metadata.clone().unwrap_or_default();

    let mut labels = metadata.labels.take().unwrap_or_default();
    labels.extend(standard_labels(&cpa_name));
    metadata.labels = Some(labels);

    metadata.name = Some(desired_pod_name(cpa));
    if metadata.namespace.as_deref().unwrap_or_default().is_empty() {
        metadata.namespace = cpa.namespace();
    }
    metadata.owner_references = Some(vec![owner_reference(cpa)]);

    let injected = agent_env_vars(cpa, scale_target_ref);
    let mut spec = template.spec.clone().unwrap_or_default();
    for container in spec.containers.iter_mut() {
        container
            .env
            .get_or_insert_with(Vec::new)
            .extend(injected.iter().cloned());
    }
    spec.service_account_name = Some(service_account_name.to_string());

    Pod {
        metadata,
        spec: Some(spec),
        ..Default::default()
    }
}
