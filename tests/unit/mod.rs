//! Unit tests for the CustomPodAutoscaler operator
//!
//! This module contains unit tests for:
//! - Resource generators (ServiceAccount, Role, RoleBinding, agent Pod)
//! - The reconciliation control loop, driven against an in-memory cluster
//! - The controller adapters and their error policy

#[path = "../common/mod.rs"]
mod common;
