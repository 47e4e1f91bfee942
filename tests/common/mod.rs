//! In-memory cluster used by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use kubechaos::k8s::{ClusterApi, ExecOutput, ExecSession, PodPhase, PodRef, ResourcePatch};
use kubechaos::{ChaosError, ChaosResult};

/// A call the engine made against the cluster
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListPods(String),
    DeletePod { name: String, namespace: String },
    PatchPod { name: String, namespace: String, patch: ResourcePatch },
    DeleteService { name: String, namespace: String },
    DeleteNode(String),
    CordonNode(String),
    EvictPod { name: String, namespace: String, grace: u32 },
    Exec { pod: String, namespace: String, command: Vec<String>, container: Option<String> },
}

/// Scripted result of one exec call
pub enum ExecScript {
    Output(Vec<ChaosResult<ExecOutput>>),
    /// Emits the items, then never closes
    Stalls(Vec<ChaosResult<ExecOutput>>),
    OpenFails(String),
}

#[derive(Default)]
pub struct FakeCluster {
    pods: Vec<(PodRef, Option<String>)>,
    services: BTreeMap<String, Vec<String>>,
    failing_namespaces: BTreeSet<String>,
    failing_services: BTreeSet<String>,
    failing_evictions: BTreeSet<String>,
    fail_cordon: bool,
    fail_patch: bool,
    exec_scripts: Mutex<VecDeque<ExecScript>>,
    calls: Mutex<Vec<Call>>,
}

fn api_error(code: u16, message: &str) -> ChaosError {
    ChaosError::ClusterMutation {
        message: message.to_string(),
        code: Some(code),
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pod(mut self, name: &str, namespace: &str, phase: PodPhase) -> Self {
        self.pods.push((PodRef::new(name, namespace, phase), None));
        self
    }

    pub fn with_pod_on_node(mut self, name: &str, namespace: &str, node: &str) -> Self {
        self.pods.push((
            PodRef::new(name, namespace, PodPhase::Running),
            Some(node.to_string()),
        ));
        self
    }

    pub fn with_services(mut self, namespace: &str, names: &[&str]) -> Self {
        self.services.insert(
            namespace.to_string(),
            names.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn failing_namespace(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    pub fn failing_service(mut self, name: &str) -> Self {
        self.failing_services.insert(name.to_string());
        self
    }

    pub fn failing_eviction(mut self, pod: &str) -> Self {
        self.failing_evictions.insert(pod.to_string());
        self
    }

    pub fn failing_cordon(mut self) -> Self {
        self.fail_cordon = true;
        self
    }

    pub fn failing_patch(mut self) -> Self {
        self.fail_patch = true;
        self
    }

    pub fn with_exec(self, script: ExecScript) -> Self {
        self.exec_scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_pods(&self, namespace: &str) -> ChaosResult<Vec<PodRef>> {
        self.record(Call::ListPods(namespace.to_string()));
        if self.failing_namespaces.contains(namespace) {
            return Err(ChaosError::ClusterQuery {
                message: "Unauthorized".to_string(),
                code: Some(401),
            });
        }
        Ok(self
            .pods
            .iter()
            .filter(|(p, _)| p.namespace == namespace)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn list_pods_on_node(&self, node: &str) -> ChaosResult<Vec<PodRef>> {
        Ok(self
            .pods
            .iter()
            .filter(|(_, n)| n.as_deref() == Some(node))
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn pod_volumes(&self, name: &str, _namespace: &str) -> ChaosResult<Vec<String>> {
        if self.pods.iter().any(|(p, _)| p.name == name) {
            Ok(vec!["data".to_string(), "kube-api-access".to_string()])
        } else {
            Err(ChaosError::ClusterQuery {
                message: format!("pods \"{}\" not found", name),
                code: Some(404),
            })
        }
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> ChaosResult<()> {
        self.record(Call::DeletePod {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        if self
            .pods
            .iter()
            .any(|(p, _)| p.name == name && p.namespace == namespace)
        {
            Ok(())
        } else {
            Err(api_error(404, &format!("pods \"{}\" not found", name)))
        }
    }

    async fn patch_pod(
        &self,
        name: &str,
        namespace: &str,
        patch: &ResourcePatch,
    ) -> ChaosResult<()> {
        self.record(Call::PatchPod {
            name: name.to_string(),
            namespace: namespace.to_string(),
            patch: patch.clone(),
        });
        if self.fail_patch {
            Err(api_error(422, "Pod \"web\" is invalid: spec: Forbidden"))
        } else {
            Ok(())
        }
    }

    async fn list_services(&self, namespace: &str) -> ChaosResult<Vec<String>> {
        if self.failing_namespaces.contains(namespace) {
            return Err(ChaosError::ClusterQuery {
                message: "Forbidden".to_string(),
                code: Some(403),
            });
        }
        Ok(self.services.get(namespace).cloned().unwrap_or_default())
    }

    async fn delete_service(&self, name: &str, namespace: &str) -> ChaosResult<()> {
        self.record(Call::DeleteService {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        if self.failing_services.contains(name) {
            Err(api_error(500, "etcdserver: request timed out"))
        } else {
            Ok(())
        }
    }

    async fn delete_node(&self, name: &str) -> ChaosResult<()> {
        self.record(Call::DeleteNode(name.to_string()));
        if name.starts_with("missing") {
            Err(api_error(404, "node not found"))
        } else {
            Ok(())
        }
    }

    async fn cordon_node(&self, name: &str) -> ChaosResult<()> {
        self.record(Call::CordonNode(name.to_string()));
        if self.fail_cordon {
            Err(api_error(404, "node not found"))
        } else {
            Ok(())
        }
    }

    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: u32,
    ) -> ChaosResult<()> {
        self.record(Call::EvictPod {
            name: name.to_string(),
            namespace: namespace.to_string(),
            grace: grace_period_seconds,
        });
        if self.failing_evictions.contains(name) {
            Err(api_error(429, "Cannot evict pod as it would violate the pod's disruption budget"))
        } else {
            Ok(())
        }
    }

    async fn exec_in_pod(
        &self,
        name: &str,
        namespace: &str,
        command: Vec<String>,
        container: Option<&str>,
    ) -> ChaosResult<ExecSession> {
        self.record(Call::Exec {
            pod: name.to_string(),
            namespace: namespace.to_string(),
            command,
            container: container.map(str::to_string),
        });

        match self.exec_scripts.lock().unwrap().pop_front() {
            Some(ExecScript::Output(items)) => Ok(ExecSession::from_items(items)),
            Some(ExecScript::Stalls(items)) => Ok(ExecSession::new(
                stream::iter(items).chain(stream::pending()),
            )),
            Some(ExecScript::OpenFails(message)) => Err(ChaosError::ExecStream(message)),
            None => Ok(ExecSession::from_items(Vec::new())),
        }
    }
}
