//! Integration tests for custom-pod-autoscaler-operator
//!
//! These tests require a running Kubernetes cluster accessible via kubeconfig.
//! Tests are marked with #[ignore] and must be run explicitly:
//!
//! ```bash
//! cargo test --test integration -- --ignored --test-threads=1
//! ```
//!
//! The tests use your existing kubeconfig (~/.kube/config or KUBECONFIG env var).
//! Note: Tests run sequentially to avoid conflicts.

#[path = "../common/mod.rs"]
mod common;

mod cluster;


// Re-export common test utilities
pub use cluster::*;
pub use crd::*;
pub use namespace::*;
pub use operator::*;
pub use wait::*;
