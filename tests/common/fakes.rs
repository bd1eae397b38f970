//! In-memory stand-in for the cluster
//!
//! [`FakeCluster`] implements every collaborator trait of the reconciler
//! against plain maps and records each call it receives, so tests can assert
//! on what was written and in which order. Object convergence uses the same
//! decision function as the real object reconciler.
//!
//! ```rust,ignore
//! let cluster = FakeCluster::new().with_autoscaler(create_test_autoscaler("my-cpa", "default"));
//! cluster.reconciler().reconcile("default", "my-cpa").await.unwrap();
//! assert_eq!(cluster.converged_kinds(), vec!["v1/ServiceAccount", "v1/Role", "v1/RoleBinding", "v1/Pod"]);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use custom_pod_autoscaler_operator::controller::cleanup::stale_pods;
use custom_pod_autoscaler_operator::controller::object_reconciler::{
    Convergence, plan_convergence,
};
use custom_pod_autoscaler_operator::controller::{
    AutoscalerStore, CustomPodAutoscalerReconciler, Dependent, Error, ObjectReconciler,
    PodCleanup, Result, ScaleClient, TargetResource,
};
use custom_pod_autoscaler_operator::crd::CustomPodAutoscaler;
use custom_pod_autoscaler_operator::resources::pod::desired_pod_name;
use k8s_openapi::api::autoscaling::v1::{Scale, ScaleSpec};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube::core::ObjectMeta;
use kube::error::ErrorResponse;
use kube::runtime::controller::Action;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A call received by the fake cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetAutoscaler {
        namespace: String,
        name: String,
    },
    DeleteAutoscaler {
        namespace: String,
        name: String,
    },
    Converge {
        kind: &'static str,
        name: String,
        should_provision: bool,
        updateable: bool,
        outcome: Convergence,
    },
    Cleanup {
        owner: String,
    },
    DeletePod {
        name: String,
    },
    GetScale {
        kind: String,
        name: String,
    },
    UpdateScale {
        kind: String,
        name: String,
        replicas: Option<i32>,
    },
}

impl Call {
    /// Whether the call changed cluster state
    pub fn is_mutation(&self) -> bool {
        match self {
            Call::Converge { outcome, .. } => *outcome != Convergence::Skip,
            Call::DeleteAutoscaler { .. } | Call::DeletePod { .. } | Call::UpdateScale { .. } => {
                true
            }
            Call::GetAutoscaler { .. } | Call::Cleanup { .. } | Call::GetScale { .. } => false,
        }
    }
}

/// Operations that can be made to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    GetAutoscaler,
    DeleteAutoscaler,
    /// Converging the dependent with this kind tag
    Converge(&'static str),
    Cleanup,
    GetScale,
    UpdateScale,
}

type ObjectKey = (&'static str, String, String);

#[derive(Default)]
pub struct FakeCluster {
    autoscalers: Mutex<BTreeMap<(String, String), CustomPodAutoscaler>>,
    objects: Mutex<BTreeMap<ObjectKey, Value>>,
    scales: Mutex<BTreeMap<(String, String, String), Scale>>,
    failures: Mutex<HashSet<FailPoint>>,
    calls: Mutex<Vec<Call>>,
}

fn server_error(what: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure: {}", what),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

fn not_found(what: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} not found", what),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a reconciler whose collaborators are all this cluster
    pub fn reconciler(self: &Arc<Self>) -> CustomPodAutoscalerReconciler {
        CustomPodAutoscalerReconciler::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn add_autoscaler(&self, cpa: CustomPodAutoscaler) {
        let key = (cpa.namespace().unwrap_or_default(), cpa.name_any());
        self.autoscalers.lock().unwrap().insert(key, cpa);
    }

    pub fn has_autoscaler(&self, namespace: &str, name: &str) -> bool {
        self.autoscalers
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Register a scalable workload with its current replica count
    pub fn add_scale_target(&self, namespace: &str, kind: &str, name: &str, replicas: i32) {
        let scale = Scale {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some("1".to_string()),
                ..Default::default()
            },
            spec: Some(ScaleSpec {
                replicas: Some(replicas),
            }),
            status: None,
        };
        self.scales.lock().unwrap().insert(
            (namespace.to_string(), kind.to_string(), name.to_string()),
            scale,
        );
    }

    pub fn replicas(&self, namespace: &str, kind: &str, name: &str) -> Option<i32> {
        self.scales
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), kind.to_string(), name.to_string()))
            .and_then(|scale| scale.spec.as_ref())
            .and_then(|spec| spec.replicas)
    }

    /// Place a Pod in the cluster as if it had been created earlier
    pub fn add_pod(&self, pod: Pod) {
        let key = ("v1/Pod", pod.namespace().unwrap_or_default(), pod.name_any());
        let value = serde_json::to_value(&pod).unwrap();
        self.objects.lock().unwrap().insert(key, value);
    }

    /// Fetch a stored object by kind tag, namespace and name
    pub fn object<K: DeserializeOwned>(&self, kind: &'static str, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    /// Overwrite a stored object, as a user editing it would
    pub fn edit_object(&self, kind: &'static str, namespace: &str, name: &str, edit: impl FnOnce(&mut Value)) {
        let mut objects = self.objects.lock().unwrap();
        let value = objects
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
            .unwrap();
        edit(value);
    }

    pub fn remove_object(&self, kind: &'static str, namespace: &str, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(kind, namespace.to_string(), name.to_string()));
    }

    /// Names of stored objects of one kind in a namespace
    pub fn object_names(&self, kind: &'static str, namespace: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.failures.lock().unwrap().insert(point);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_mutation)
            .collect()
    }

    /// Kind tags passed to the object reconciler, in call order
    pub fn converged_kinds(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Converge { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failures.lock().unwrap().contains(&point) {
            return Err(server_error(&format!("{:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl AutoscalerStore for FakeCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CustomPodAutoscaler>> {
        self.record(Call::GetAutoscaler {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self.check(FailPoint::GetAutoscaler)?;
        Ok(self
            .autoscalers
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete(&self, cpa: &CustomPodAutoscaler) -> Result<()> {
        let namespace = cpa.namespace().unwrap_or_default();
        let name = cpa.name_any();
        self.check(FailPoint::DeleteAutoscaler)?;
        self.record(Call::DeleteAutoscaler {
            namespace: namespace.clone(),
            name: name.clone(),
        });
        self.autoscalers.lock().unwrap().remove(&(namespace, name));
        Ok(())
    }
}

#[async_trait]
impl ObjectReconciler for FakeCluster {
    async fn reconcile(
        &self,
        owner: &CustomPodAutoscaler,
        desired: Dependent,
        should_provision: bool,
        updateable: bool,
    ) -> Result<Action> {
        let kind = desired.kind_tag();
        self.check(FailPoint::Converge(kind))?;

        let name = desired.name();
        let value = match &desired {
            Dependent::ServiceAccount(o) => serde_json::to_value(o)?,
            Dependent::Role(o) => serde_json::to_value(o)?,
            Dependent::RoleBinding(o) => serde_json::to_value(o)?,
            Dependent::Pod(o) => serde_json::to_value(o)?,
        };
        let namespace = value
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| owner.namespace().unwrap_or_default());
        let key = (kind, namespace, name.clone());

        let mut objects = self.objects.lock().unwrap();
        let outcome = plan_convergence(objects.get(&key), &value, should_provision, updateable);
        if outcome != Convergence::Skip {
            objects.insert(key, value);
        }
        drop(objects);

        self.record(Call::Converge {
            kind,
            name,
            should_provision,
            updateable,
            outcome,
        });
        Ok(Action::await_change())
    }
}

#[async_trait]
impl PodCleanup for FakeCluster {
    async fn cleanup(&self, owner: &CustomPodAutoscaler) -> Result<()> {
        let owner_name = owner.name_any();
        let namespace = owner.namespace().unwrap_or_default();
        self.record(Call::Cleanup {
            owner: owner_name.clone(),
        });
        self.check(FailPoint::Cleanup)?;

        let pods: Vec<Pod> = self
            .object_names("v1/Pod", &namespace)
            .iter()
            .filter_map(|name| self.object("v1/Pod", &namespace, name))
            .collect();
        let desired = desired_pod_name(owner);

        for pod in stale_pods(&pods, &owner_name, &desired) {
            let name = pod.name_any();
            self.remove_object("v1/Pod", &namespace, &name);
            self.record(Call::DeletePod { name });
        }
        Ok(())
    }
}

#[async_trait]
impl ScaleClient for FakeCluster {
    async fn get_scale(&self, namespace: &str, target: &TargetResource, name: &str) -> Result<Scale> {
        self.record(Call::GetScale {
            kind: target.kind.clone(),
            name: name.to_string(),
        });
        self.check(FailPoint::GetScale)?;
        self.scales
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), target.kind.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&format!("{} {}/{}", target.kind, namespace, name)))
    }

    async fn update_scale(
        &self,
        namespace: &str,
        target: &TargetResource,
        scale: &Scale,
    ) -> Result<Scale> {
        let name = scale.metadata.name.clone().unwrap_or_default();
        self.check(FailPoint::UpdateScale)?;
        self.record(Call::UpdateScale {
            kind: target.kind.clone(),
            name: name.clone(),
            replicas: scale.spec.as_ref().and_then(|spec| spec.replicas),
        });
        self.scales.lock().unwrap().insert(
            (namespace.to_string(), target.kind.clone(), name),
            scale.clone(),
        );
        Ok(scale.clone())
    }
}
