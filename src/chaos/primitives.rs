//! Fault primitives
//!
//! One method per disruption. Cluster errors stop at this boundary: they are
//! logged and the call returns normally, so a clean return does not prove the
//! fault took effect.

use std::time::Duration;

use tracing::{error, info, instrument, warn};

use super::conditions::{
    ensure_dir_command, fill_disk_command, resource_limit_patch, shell_command,
    EVICTION_GRACE_PERIOD_SECONDS,
};
use crate::k8s::{ClusterApi, ExecTranscript};

/// Applies faults against explicit targets through a borrowed cluster handle
pub struct FaultInjector<'a, C: ?Sized> {
    cluster: &'a C,
    exec_timeout: Option<Duration>,
    container_index: usize,
}

impl<'a, C: ClusterApi + ?Sized> FaultInjector<'a, C> {
    pub fn new(cluster: &'a C) -> Self {
        Self {
            cluster,
            exec_timeout: None,
            container_index: 0,
        }
    }

    /// Abandon exec streams that stay open longer than `timeout`
    pub fn with_exec_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.exec_timeout = timeout;
        self
    }

    /// Container index targeted by resource limit patches
    pub fn with_container_index(mut self, index: usize) -> Self {
        self.container_index = index;
        self
    }

    /// Delete a pod. A pod that is already gone is logged, not raised.
    #[instrument(skip(self))]
    pub async fn terminate_pod(&self, pod: &str, namespace: &str) {
        match self.cluster.delete_pod(pod, namespace).await {
            Ok(()) => info!("Deleted pod {} in namespace {}", pod, namespace),
            Err(e) if e.is_not_found() => {
                warn!(error = %e, "Pod not found (already deleted?)")
            }
            Err(e) => error!(error = %e, "Failed to delete pod"),
        }
    }

    /// Cordon the node, then evict each pod on it with zero grace period.
    /// Nothing is retried.
    #[instrument(skip(self))]
    pub async fn evict_node(&self, node: &str) {
        if let Err(e) = self.cluster.cordon_node(node).await {
            error!(error = %e, "Failed to cordon node");
            return;
        }

        let pods = match self.cluster.list_pods_on_node(node).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(error = %e, "Failed to list pods on node");
                return;
            }
        };

        let mut evicted = 0usize;
        for pod in &pods {
            match self
                .cluster
                .evict_pod(&pod.name, &pod.namespace, EVICTION_GRACE_PERIOD_SECONDS)
                .await
            {
                Ok(()) => evicted += 1,
                Err(e) => {
                    warn!(pod = %pod.name, namespace = %pod.namespace, error = %e, "Failed to evict pod")
                }
            }
        }

        info!(evicted, total = pods.len(), "Triggered eviction for node {}", node);
    }

    /// Delete each node in turn. Irreversible.
    #[instrument(skip(self))]
    pub async fn delete_nodes(&self, nodes: &[String]) {
        for node in nodes {
            match self.cluster.delete_node(node).await {
                Ok(()) => info!("Deleted node: {}", node),
                Err(e) => error!(node = %node, error = %e, "Failed to delete node"),
            }
        }
    }

    /// Delete every service in each namespace. Irreversible; one failed
    /// deletion does not stop the rest.
    #[instrument(skip(self))]
    pub async fn delete_all_services(&self, namespaces: &[String]) {
        for namespace in namespaces {
            let services = match self.cluster.list_services(namespace).await {
                Ok(services) => services,
                Err(e) => {
                    error!(namespace = %namespace, error = %e, "Failed to list services");
                    continue;
                }
            };

            for service in services {
                match self.cluster.delete_service(&service, namespace).await {
                    Ok(()) => info!("Deleted service {} in namespace {}", service, namespace),
                    Err(e) => {
                        error!(service = %service, namespace = %namespace, error = %e, "Failed to delete service")
                    }
                }
            }
        }
    }

    /// Replace the CPU and/or memory limit of the pod's container.
    /// Limits left as `None` are not touched.
    #[instrument(skip(self))]
    pub async fn patch_resource_limits(
        &self,
        pod: &str,
        namespace: &str,
        cpu: Option<&str>,
        memory: Option<&str>,
    ) {
        let patch = resource_limit_patch(self.container_index, cpu, memory);
        if patch.is_empty() {
            warn!("No CPU or memory limit given, nothing to patch");
            return;
        }

        match self.cluster.patch_pod(pod, namespace, &patch).await {
            Ok(()) => info!("Starved resources for pod {} in namespace {}", pod, namespace),
            Err(e) => error!(error = %e, "Failed to patch pod resource limits"),
        }
    }

    /// Create the target directory, then write `size_mb` of zeros into it.
    /// Returns the transcript of the last step that ran.
    #[instrument(skip(self))]
    pub async fn disk_pressure(
        &self,
        pod: &str,
        namespace: &str,
        size_mb: u64,
        container: Option<&str>,
    ) -> ExecTranscript {
        let prepared = self
            .run_exec(pod, namespace, &ensure_dir_command(), container)
            .await;
        if !prepared.completed() {
            error!("Could not prepare disk pressure directory, skipping write");
            return prepared;
        }

        let transcript = self
            .run_exec(pod, namespace, &fill_disk_command(size_mb), container)
            .await;
        if transcript.completed() {
            info!(
                "Simulated high disk I/O for pod {} in namespace {} ({} MB)",
                pod, namespace, size_mb
            );
        }
        transcript
    }

    /// Run a shell command in the pod and stream its output.
    /// The remote exit status is not observed.
    #[instrument(skip(self))]
    pub async fn exec_command(
        &self,
        pod: &str,
        namespace: &str,
        command: &str,
        container: Option<&str>,
    ) -> ExecTranscript {
        self.run_exec(pod, namespace, command, container).await
    }

    async fn run_exec(
        &self,
        pod: &str,
        namespace: &str,
        command: &str,
        container: Option<&str>,
    ) -> ExecTranscript {
        match self
            .cluster
            .exec_in_pod(pod, namespace, shell_command(command), container)
            .await
        {
            Ok(session) => session.drain(self.exec_timeout).await,
            Err(e) => {
                error!(command, error = %e, "Failed to open exec stream");
                ExecTranscript::failed(e.to_string())
            }
        }
    }
}
