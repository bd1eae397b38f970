pub mod cleanup;
pub mod collaborators;
pub mod context;
pub mod error;
pub mod filter;
pub mod object_reconciler;
pub mod pause;
pub mod reconciler;
pub mod scale;
pub mod store;

pub use collaborators::{AutoscalerStore, Dependent, ObjectReconciler, PodCleanup, ScaleClient};
pub use context::Context;
pub use error::{BackoffConfig, Error, Result};
pub use filter::{ObjectRole, WatchEventKind, filter_events, should_reconcile};
pub use reconciler::{CustomPodAutoscalerReconciler, Outcome, error_policy, reconcile};
pub use scale::TargetResource;
