//! Read-only inventory queries
//!
//! Each namespace is listed exactly once per snapshot; every filtered view is
//! derived from that snapshot instead of re-querying the cluster.

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::cluster::{ClusterApi, PodRef};
use crate::error::ChaosResult;

/// Pods gathered from one pass over a set of namespaces.
///
/// Namespaces are listed one after another, so the snapshot is not atomic
/// across them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pods: Vec<PodRef>,
}

impl ClusterSnapshot {
    pub fn from_pods(pods: Vec<PodRef>) -> Self {
        Self { pods }
    }

    pub fn pods(&self) -> &[PodRef] {
        &self.pods
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Names of every pod, any phase, in listing order
    pub fn pod_names(&self) -> Vec<String> {
        self.pods.iter().map(|p| p.name.clone()).collect()
    }

    /// Running pods as name -> namespace. A name seen in several namespaces
    /// maps to the last one listed.
    pub fn running_pod_names(&self) -> BTreeMap<String, String> {
        self.pods
            .iter()
            .filter(|p| p.is_running())
            .map(|p| (p.name.clone(), p.namespace.clone()))
            .collect()
    }
}

/// Cluster inventory queries over an explicitly passed client handle
pub struct ClusterView<'a, C: ?Sized> {
    cluster: &'a C,
}

impl<'a, C: ClusterApi + ?Sized> ClusterView<'a, C> {
    pub fn new(cluster: &'a C) -> Self {
        Self { cluster }
    }

    /// List the pods of one namespace. Errors are returned to the caller.
    pub async fn list_pods(&self, namespace: &str) -> ChaosResult<Vec<PodRef>> {
        self.cluster.list_pods(namespace).await
    }

    /// List every namespace once. A namespace that fails to list is logged
    /// and contributes no pods.
    pub async fn snapshot(&self, namespaces: &[String]) -> ClusterSnapshot {
        let mut pods = Vec::new();

        for namespace in namespaces {
            match self.list_pods(namespace).await {
                Ok(listed) => {
                    info!(namespace = %namespace, count = listed.len(), "Listed pods");
                    pods.extend(listed);
                }
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Failed to list pods, treating namespace as empty");
                }
            }
        }

        ClusterSnapshot::from_pods(pods)
    }

    pub async fn list_running_pod_names(&self, namespaces: &[String]) -> BTreeMap<String, String> {
        self.snapshot(namespaces).await.running_pod_names()
    }

    /// Volume names of a pod, or nothing if the pod cannot be read
    pub async fn pod_volumes(&self, name: &str, namespace: &str) -> Vec<String> {
        match self.cluster.pod_volumes(name, namespace).await {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!(pod = %name, namespace = %namespace, error = %e, "Failed to read pod volumes");
                Vec::new()
            }
        }
    }
}
