//! KubeChaos Library
//!
//! Fault injection for Kubernetes clusters: victim selection, fault
//! primitives, the exec bridge and the network latency lifecycle.

pub mod chaos;
pub mod config;
pub mod error;
pub mod k8s;

pub use error::{ChaosError, ChaosResult};
