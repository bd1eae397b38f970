//! Identity and permission resources for the autoscaler agent
//!
//! The agent runs under a ServiceAccount bound to a Role that lets it read
//! pods and read/scale the common workload kinds. The Role is optionally
//! extended for the metrics APIs and for Argo Rollouts.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::controller::error::{Error, Result};
use crate::crd::{CustomPodAutoscaler, Provisioning};
use crate::resources::common::{owner_reference, standard_labels};

fn rule(api_groups: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(|g| g.to_string()).collect()),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: vec!["*".to_string()],
        ..Default::default()
    }
}

/// Resolve the ServiceAccount the agent Pod runs under
///
/// When provisioning is enabled the ServiceAccount is named after the
/// autoscaler. Otherwise the template must reference an existing one.
pub fn resolve_service_account(
    cpa: &CustomPodAutoscaler,
    provision: bool,
) -> Result<ServiceAccount> {
    let name = if provision {
        cpa.name_any()
    } else {
        cpa.spec
            .template
            .spec
            .as_ref()
            .and_then(|spec| spec.service_account_name.clone())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::ValidationError(
                    "ServiceAccount not provided in the CustomPodAutoscaler spec".to_string(),
                )
            })?
    };

    Ok(generate_service_account(cpa, name))
}

/// Generate a ServiceAccount with the given name for the autoscaler
pub fn generate_service_account(cpa: &CustomPodAutoscaler, name: String) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: cpa.namespace(),
            labels: Some(standard_labels(&cpa.name_any())),
            owner_references: Some(vec![owner_reference(cpa)]),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Policy rules granted to the agent
///
/// The baseline covers pods and the scalable core/apps workloads. Each
/// enabled extension appends exactly one rule.
pub fn policy_rules(provisioning: &Provisioning) -> Vec<PolicyRule> {
    let mut rules = vec![
        rule(
            &[""],
            &["pods", "replicationcontrollers", "replicationcontrollers/scale"],
        ),
        rule(
            &["apps"],
            &[
                "deployments",
                "deployments/scale",
                "replicasets",
                "replicasets/scale",
                "statefulsets",
                "statefulsets/scale",
            ],
        ),
    ];

    if provisioning.metrics_server {
        rules.push(rule(
            &["metrics.k8s.io", "custom.metrics.k8s.io", "external.metrics.k8s.io"],
            &["*"],
        ));
    }

    if provisioning.argo_rollouts {
        rules.push(rule(&["argoproj.io"], &["rollouts", "rollouts/scale"]));
    }

    rules
}

/// Generate the Role for the autoscaler agent
pub fn generate_role(cpa: &CustomPodAutoscaler, provisioning: &Provisioning) -> Role {
    let name = cpa.name_any();

    Role {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: cpa.namespace(),
            labels: Some(standard_labels(&name)),
            owner_references: Some(vec![owner_reference(cpa)]),
            ..Default::default()
        },
        rules: Some(policy_rules(provisioning)),
    }
}

/// Generate a RoleBinding granting the Role to the provisioned ServiceAccount
pub fn generate_role_binding(cpa: &CustomPodAutoscaler) -> RoleBinding {
    let name = cpa.name_any();
    let ns = cpa.namespace();

    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: ns.clone(),
            labels: Some(standard_labels(&name)),
            owner_references: Some(vec![owner_reference(cpa)]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: name.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name,
            namespace: ns,
            ..Default::default()
        }]),
    }
}
