//! Common utilities for Kubernetes resource generation
//!
//! This module provides shared constants and helpers used by every
//! generator, so that all dependents of a CustomPodAutoscaler are labelled
//! and owned the same way.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::CustomPodAutoscaler;

/// API version for the CustomPodAutoscaler CRD
pub const API_VERSION: &str = "custompodautoscaler.com/v1";

/// Kind for the CustomPodAutoscaler CRD
pub const KIND: &str = "CustomPodAutoscaler";

/// Operator identity, used as field manager and as the managed-by label value
pub const FIELD_MANAGER: &str = "custom-pod-autoscaler-operator";

/// Label recording which controller manages an object
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label recording which CustomPodAutoscaler an object belongs to
pub const OWNED_BY_LABEL: &str = "v1.custompodautoscaler.com/owned-by";

/// Annotation that pauses autoscaling and pins the target's replica count
pub const PAUSED_REPLICAS_ANNOTATION: &str = "v1.custompodautoscaler.com/paused-replicas";

/// Generate a controller owner reference for a CustomPodAutoscaler
///
/// Every generated object carries this so the cluster garbage collects it
/// once the autoscaler is deleted.
pub fn owner_reference(cpa: &CustomPodAutoscaler) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: cpa.name_any(),
        uid: cpa.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Generate the ownership labels carried by every dependent of a CustomPodAutoscaler
pub fn standard_labels(cpa_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string()),
        (OWNED_BY_LABEL.to_string(), cpa_name.to_string()),
    ])
}

/// Label selector matching every object owned by the named CustomPodAutoscaler
pub fn owned_by_selector(cpa_name: &str) -> String {
    format!("{}={}", OWNED_BY_LABEL, cpa_name)
}
