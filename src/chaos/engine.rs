//! Chaos engine
//!
//! Glues the pieces together: snapshot the namespaces, pick a victim, apply
//! the primitive. Network latency always goes through the lifecycle
//! controller so the delay rule is reverted.

use std::time::Duration;

use rand::Rng;
use tracing::{info, instrument, warn};

use super::network::{NetworkControl, NetworkFaultController, Pause, SignalAwarePause, TcNetworkControl};
use super::primitives::FaultInjector;
use super::selector::{select_random_pod, VictimFilter};
use super::types::{FaultAction, Outcome, Target};
use crate::error::ChaosResult;
use crate::k8s::{ClusterApi, ClusterView};

/// Runs fault actions against one cluster handle.
///
/// An engine runs one action at a time. Separate engines may share the same
/// cluster handle but nothing else.
pub struct ChaosEngine<'a, C: ?Sized, N = TcNetworkControl, P = SignalAwarePause> {
    cluster: &'a C,
    namespaces: Vec<String>,
    exec_timeout: Option<Duration>,
    network: NetworkFaultController<N, P>,
}

impl<'a, C, N, P> ChaosEngine<'a, C, N, P>
where
    C: ClusterApi + ?Sized,
    N: NetworkControl,
    P: Pause,
{
    pub fn new(
        cluster: &'a C,
        namespaces: Vec<String>,
        network: NetworkFaultController<N, P>,
    ) -> Self {
        Self {
            cluster,
            namespaces,
            exec_timeout: None,
            network,
        }
    }

    pub fn with_exec_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn network(&self) -> &NetworkFaultController<N, P> {
        &self.network
    }

    fn injector(&self) -> FaultInjector<'a, C> {
        FaultInjector::new(self.cluster).with_exec_timeout(self.exec_timeout)
    }

    /// Run one fault action.
    ///
    /// Pod-targeted actions pick their victim from a fresh snapshot with
    /// `filter` and `rng`. Only network control failures and interrupts are
    /// returned as errors.
    #[instrument(skip(self, action, filter, rng), fields(action = %action))]
    pub async fn run<R>(
        &mut self,
        action: &FaultAction,
        filter: &VictimFilter,
        rng: &mut R,
    ) -> ChaosResult<Outcome>
    where
        R: Rng + ?Sized,
    {
        match action {
            FaultAction::Evict { node } => {
                self.injector().evict_node(node).await;
                Ok(Outcome::Applied(Target::Node(node.clone())))
            }
            FaultAction::DeleteNodes { nodes } => {
                self.injector().delete_nodes(nodes).await;
                Ok(Outcome::Applied(Target::Nodes(nodes.clone())))
            }
            FaultAction::DeleteAllServices => {
                self.injector().delete_all_services(&self.namespaces).await;
                Ok(Outcome::Applied(Target::Namespaces(self.namespaces.clone())))
            }
            FaultAction::InjectLatency {
                interface,
                delay_ms,
                duration,
            } => self.inject_latency(interface.as_deref(), *delay_ms, *duration).await,
            FaultAction::Terminate
            | FaultAction::ResourceLimit { .. }
            | FaultAction::DiskPressure { .. }
            | FaultAction::Exec { .. } => self.run_on_random_pod(action, filter, rng).await,
        }
    }

    async fn inject_latency(
        &mut self,
        interface: Option<&str>,
        delay_ms: u32,
        duration: Duration,
    ) -> ChaosResult<Outcome> {
        let interface = match interface {
            Some(interface) => interface.to_string(),
            None => match self.network.control().default_interface().await {
                Some(interface) => interface,
                None => {
                    warn!("Unable to determine network interface");
                    return Ok(Outcome::Skipped {
                        reason: "no network interface".to_string(),
                    });
                }
            },
        };

        self.network
            .run_timed_network_fault(&interface, delay_ms, duration)
            .await?;
        Ok(Outcome::Applied(Target::Interface(interface)))
    }

    async fn run_on_random_pod<R>(
        &self,
        action: &FaultAction,
        filter: &VictimFilter,
        rng: &mut R,
    ) -> ChaosResult<Outcome>
    where
        R: Rng + ?Sized,
    {
        let running = ClusterView::new(self.cluster)
            .list_running_pod_names(&self.namespaces)
            .await;

        if running.is_empty() {
            info!(namespaces = ?self.namespaces, "No running pods, skipping");
            return Ok(Outcome::NoVictim);
        }

        let Some((pod, namespace)) = select_random_pod(&running, filter, rng) else {
            info!(candidates = running.len(), "No running pod passes the victim filter, skipping");
            return Ok(Outcome::NoVictim);
        };

        info!(pod = %pod, namespace = %namespace, "Selected victim");
        self.apply_to_pod(action, &pod, &namespace).await;

        Ok(Outcome::Applied(Target::Pod {
            name: pod,
            namespace,
        }))
    }

    /// Apply a pod-targeted action to an already chosen pod.
    /// Actions that do not target pods are ignored with a warning.
    pub async fn apply_to_pod(&self, action: &FaultAction, pod: &str, namespace: &str) {
        let injector = self.injector();
        match action {
            FaultAction::Terminate => injector.terminate_pod(pod, namespace).await,
            FaultAction::ResourceLimit { cpu, memory } => {
                injector
                    .patch_resource_limits(pod, namespace, cpu.as_deref(), memory.as_deref())
                    .await
            }
            FaultAction::DiskPressure { size_mb, container } => {
                injector
                    .disk_pressure(pod, namespace, *size_mb, container.as_deref())
                    .await;
            }
            FaultAction::Exec { command, container } => {
                injector
                    .exec_command(pod, namespace, command, container.as_deref())
                    .await;
            }
            other => warn!(action = %other, "Action does not target a pod"),
        }
    }
}
