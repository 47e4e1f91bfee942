//! Control-plane surface consumed by the chaos engine
//!
//! Every fault primitive talks to the cluster through [`ClusterApi`], so the
//! same code drives a live cluster via [`super::K8sClient`] or an in-memory fake.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

use super::exec::ExecSession;
use crate::error::ChaosResult;

/// Lifecycle phase reported in a pod's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A pod as seen in one listing. Only meaningful within that snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
}

impl PodRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase,
        }
    }

    /// Build from an API object, falling back to `namespace` when metadata lacks one
    pub fn from_pod(pod: &Pod, namespace: &str) -> Self {
        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from)
            .unwrap_or(PodPhase::Unknown);

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| namespace.to_string()),
            phase,
        }
    }

    /// Build from an API object that must carry its own namespace, as
    /// cluster-wide listings do
    pub fn from_namespaced_pod(pod: &Pod) -> Option<Self> {
        let namespace = pod.metadata.namespace.as_deref()?;
        Some(Self::from_pod(pod, namespace))
    }

    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }
}

/// RFC 6902 operation kinds used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One JSON patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A JSON patch document, serialized as a bare array of operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePatch(pub Vec<PatchOperation>);

impl ResourcePatch {
    pub fn push(&mut self, op: PatchOperation) {
        self.0.push(op);
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any operation's path contains `fragment`
    pub fn touches(&self, fragment: &str) -> bool {
        self.0.iter().any(|op| op.path.contains(fragment))
    }
}

/// Operations the engine needs from the Kubernetes control plane
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_pods(&self, namespace: &str) -> ChaosResult<Vec<PodRef>>;

    /// Pods scheduled on `node`, across all namespaces
    async fn list_pods_on_node(&self, node: &str) -> ChaosResult<Vec<PodRef>>;

    /// Names of the volumes declared in the pod spec
    async fn pod_volumes(&self, name: &str, namespace: &str) -> ChaosResult<Vec<String>>;

    async fn delete_pod(&self, name: &str, namespace: &str) -> ChaosResult<()>;

    async fn patch_pod(&self, name: &str, namespace: &str, patch: &ResourcePatch)
        -> ChaosResult<()>;

    async fn list_services(&self, namespace: &str) -> ChaosResult<Vec<String>>;

    async fn delete_service(&self, name: &str, namespace: &str) -> ChaosResult<()>;

    async fn delete_node(&self, name: &str) -> ChaosResult<()>;

    /// Mark the node unschedulable
    async fn cordon_node(&self, name: &str) -> ChaosResult<()>;

    /// Evict a pod through the policy/v1 eviction subresource
    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: u32,
    ) -> ChaosResult<()>;

    /// Open an exec stream running `command` in the pod
    async fn exec_in_pod(
        &self,
        name: &str,
        namespace: &str,
        command: Vec<String>,
        container: Option<&str>,
    ) -> ChaosResult<ExecSession>;
}
