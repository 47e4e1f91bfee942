//! Kubernetes integration module for the chaos engine
//!
//! This module handles all interactions with the cluster:
//! - The control-plane operations consumed by fault primitives
//! - Read-only inventory snapshots
//! - Streaming command execution inside containers

mod client;
mod cluster;
mod exec;
mod view;

pub use client::K8sClient;
pub use cluster::{ClusterApi, PatchOp, PatchOperation, PodPhase, PodRef, ResourcePatch};
pub use exec::{ExecOutput, ExecSession, ExecTranscript};
pub use view::{ClusterSnapshot, ClusterView};
