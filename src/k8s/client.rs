//! Kubernetes client wrapper for the chaos engine

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::{
    api::{Api, AttachParams, DeleteParams, EvictParams, ListParams, Patch, PatchParams},
    Client, Config,
};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::cluster::{ClusterApi, PodRef, ResourcePatch};
use super::exec::ExecSession;
use crate::error::{ChaosError, ChaosResult};

/// Wrapper around kube::Client implementing [`ClusterApi`]
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a new K8sClient using the default kubeconfig or in-cluster config
    #[instrument(skip_all)]
    pub async fn new() -> Result<Self> {
        let config = Config::infer().await?;
        let client = Client::try_from(config)?;

        info!("Connected to Kubernetes cluster");

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the inner kube Client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    /// Check if cluster is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let version = self.client.apiserver_version().await?;
        info!(version = %version.git_version, "Kubernetes cluster is healthy");
        Ok(true)
    }
}

#[async_trait]
impl ClusterApi for K8sClient {
    #[instrument(skip(self))]
    async fn list_pods(&self, namespace: &str) -> ChaosResult<Vec<PodRef>> {
        let list = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(ChaosError::query)?;

        debug!(count = list.items.len(), "Listed pods");
        Ok(list
            .items
            .iter()
            .map(|pod| PodRef::from_pod(pod, namespace))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_pods_on_node(&self, node: &str) -> ChaosResult<Vec<PodRef>> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let selector = format!("spec.nodeName={}", node);
        let list = pods
            .list(&ListParams::default().fields(&selector))
            .await
            .map_err(ChaosError::query)?;

        Ok(list
            .items
            .iter()
            .filter_map(PodRef::from_namespaced_pod)
            .collect())
    }

    #[instrument(skip(self))]
    async fn pod_volumes(&self, name: &str, namespace: &str) -> ChaosResult<Vec<String>> {
        let pod = self
            .pods(namespace)
            .get(name)
            .await
            .map_err(ChaosError::query)?;

        Ok(pod
            .spec
            .and_then(|spec| spec.volumes)
            .unwrap_or_default()
            .into_iter()
            .map(|volume| volume.name)
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_pod(&self, name: &str, namespace: &str) -> ChaosResult<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(ChaosError::mutation)?;
        info!("Deleted pod");
        Ok(())
    }

    #[instrument(skip(self, patch), fields(ops = patch.len()))]
    async fn patch_pod(
        &self,
        name: &str,
        namespace: &str,
        patch: &ResourcePatch,
    ) -> ChaosResult<()> {
        let document = serde_json::to_value(patch)
            .and_then(serde_json::from_value::<json_patch::Patch>)
            .map_err(|e| ChaosError::ClusterMutation {
                message: format!("failed to encode patch: {}", e),
                code: None,
            })?;

        self.pods(namespace)
            .patch(name, &PatchParams::default(), &Patch::Json::<()>(document))
            .await
            .map_err(ChaosError::mutation)?;
        info!("Patched pod");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_services(&self, namespace: &str) -> ChaosResult<Vec<String>> {
        let list = self
            .services(namespace)
            .list(&ListParams::default())
            .await
            .map_err(ChaosError::query)?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|svc| svc.metadata.name)
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_service(&self, name: &str, namespace: &str) -> ChaosResult<()> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(ChaosError::mutation)?;
        info!("Deleted service");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_node(&self, name: &str) -> ChaosResult<()> {
        self.nodes()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(ChaosError::mutation)?;
        info!("Deleted node");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cordon_node(&self, name: &str) -> ChaosResult<()> {
        let patch = json!({ "spec": { "unschedulable": true } });
        self.nodes()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(ChaosError::mutation)?;
        info!("Cordoned node");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: u32,
    ) -> ChaosResult<()> {
        let params = EvictParams {
            delete_options: Some(DeleteParams {
                grace_period_seconds: Some(grace_period_seconds),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.pods(namespace)
            .evict(name, &params)
            .await
            .map_err(ChaosError::mutation)?;
        info!("Evicted pod");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn exec_in_pod(
        &self,
        name: &str,
        namespace: &str,
        command: Vec<String>,
        container: Option<&str>,
    ) -> ChaosResult<ExecSession> {
        let params = AttachParams {
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
            container: container.map(str::to_string),
            ..Default::default()
        };

        let attached = self
            .pods(namespace)
            .exec(name, command, &params)
            .await
            .map_err(|e| ChaosError::ExecStream(e.to_string()))?;

        Ok(ExecSession::from_attached(attached))
    }
}
