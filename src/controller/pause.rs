//! Pause override
//!
//! Annotating a CustomPodAutoscaler with the paused-replicas annotation
//! removes the autoscaler, and with it the agent Pod, then pins the scale
//! target to the annotated replica count.

use k8s_openapi::api::autoscaling::v1::ScaleSpec;
use kube::ResourceExt;
use tracing::{info, instrument};

use crate::controller::error::{Error, Result};
use crate::controller::reconciler::{CustomPodAutoscalerReconciler, Outcome};
use crate::controller::scale::TargetResource;
use crate::crd::CustomPodAutoscaler;
use crate::resources::PAUSED_REPLICAS_ANNOTATION;

/// Raw value of the paused-replicas annotation, if set
pub fn paused_replicas(cpa: &CustomPodAutoscaler) -> Option<&str> {
    cpa.annotations()
        .get(PAUSED_REPLICAS_ANNOTATION)
        .map(String::as_str)
}

/// Parse a paused replica count as a base-10 signed 32 bit integer
pub fn parse_paused_replicas(raw: &str) -> Result<i32> {
    raw.parse::<i32>().map_err(|e| {
        Error::ValidationError(format!(
            "invalid {} annotation value {:?}: {}",
            PAUSED_REPLICAS_ANNOTATION, raw, e
        ))
    })
}

impl CustomPodAutoscalerReconciler {
    /// Remove the autoscaler and pin its scale target to `raw` replicas
    ///
    /// The autoscaler is deleted before the scale target is touched so the
    /// agent cannot scale it back. If a later step fails the annotation is
    /// still in place and the next attempt starts over from the parse.
    #[instrument(skip(self, cpa), fields(name = %cpa.name_any()))]
    pub(crate) async fn pause(&self, cpa: &CustomPodAutoscaler, raw: &str) -> Result<Outcome> {
        let replicas = parse_paused_replicas(raw)?;
        let ns = cpa
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;

        self.store.delete(cpa).await?;

        let reference = &cpa.spec.scale_target_ref;
        let target = TargetResource::from_reference(reference)?;

        let mut scale = self
            .scaling
            .get_scale(&ns, &target, &reference.name)
            .await?;
        scale
            .spec
            .get_or_insert_with(ScaleSpec::default)
            .replicas = Some(replicas);
        self.scaling.update_scale(&ns, &target, &scale).await?;

        info!(
            "Paused autoscaling, {} {}/{} pinned to {} replicas",
            reference.kind, ns, reference.name, replicas
        );
        Ok(Outcome::Paused(replicas))
    }
}
