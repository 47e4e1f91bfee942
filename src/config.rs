use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::chaos::{FaultAction, VictimFilter};
use crate::error::{ChaosError, ChaosResult};

/// Engine settings, read from `CHAOS_*` environment variables (and `.env`)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// One of: terminate, evict, delete-nodes, network-latency,
    /// disk-pressure, resource-limit, exec, delete-services
    #[serde(default = "default_action")]
    pub action: String,

    #[serde(default)]
    pub pod_name_regex: Option<String>,

    #[serde(default)]
    pub exceptions: Vec<String>,

    /// Fixed RNG seed for reproducible victim selection
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub cpu_limit: Option<String>,

    #[serde(default)]
    pub memory_limit: Option<String>,

    #[serde(default = "default_disk_size_mb")]
    pub disk_size_mb: u64,

    #[serde(default)]
    pub container: Option<String>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub nodes: Vec<String>,

    #[serde(default)]
    pub network_interface: Option<String>,

    #[serde(default = "default_latency_ms")]
    pub latency_ms: u32,

    #[serde(default = "default_latency_duration_secs")]
    pub latency_duration_secs: u64,

    #[serde(default = "default_tc_path")]
    pub tc_path: String,

    /// Unset means exec streams are read until the remote side closes them
    #[serde(default)]
    pub exec_timeout_secs: Option<u64>,
}

fn default_namespaces() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_action() -> String {
    "terminate".to_string()
}

fn default_disk_size_mb() -> u64 {
    100
}

fn default_latency_ms() -> u32 {
    500
}

fn default_latency_duration_secs() -> u64 {
    10
}

fn default_tc_path() -> String {
    "tc".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("CHAOS")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("namespaces")
                    .with_list_parse_key("exceptions")
                    .with_list_parse_key("nodes"),
            )
            .build()?;

        let settings: Config = config.try_deserialize()?;
        Ok(settings)
    }

    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_secs.map(Duration::from_secs)
    }

    pub fn victim_filter(&self) -> ChaosResult<VictimFilter> {
        VictimFilter::from_parts(self.pod_name_regex.as_deref(), self.exceptions.iter().cloned())
    }

    /// Turn the flat settings into the configured fault action
    pub fn fault_action(&self) -> ChaosResult<FaultAction> {
        let action = match self.action.as_str() {
            "terminate" => FaultAction::Terminate,
            "evict" => match self.nodes.as_slice() {
                [node] => FaultAction::Evict { node: node.clone() },
                _ => {
                    return Err(ChaosError::InvalidConfig(
                        "evict needs exactly one entry in nodes".to_string(),
                    ))
                }
            },
            "delete-nodes" => {
                if self.nodes.is_empty() {
                    return Err(ChaosError::InvalidConfig(
                        "delete-nodes needs at least one entry in nodes".to_string(),
                    ));
                }
                FaultAction::DeleteNodes {
                    nodes: self.nodes.clone(),
                }
            }
            "network-latency" => FaultAction::InjectLatency {
                interface: self.network_interface.clone(),
                delay_ms: self.latency_ms,
                duration: Duration::from_secs(self.latency_duration_secs),
            },
            "disk-pressure" => FaultAction::DiskPressure {
                size_mb: self.disk_size_mb,
                container: self.container.clone(),
            },
            "resource-limit" => {
                if self.cpu_limit.is_none() && self.memory_limit.is_none() {
                    return Err(ChaosError::InvalidConfig(
                        "resource-limit needs cpu_limit or memory_limit".to_string(),
                    ));
                }
                FaultAction::ResourceLimit {
                    cpu: self.cpu_limit.clone(),
                    memory: self.memory_limit.clone(),
                }
            }
            "exec" => match &self.command {
                Some(command) => FaultAction::Exec {
                    command: command.clone(),
                    container: self.container.clone(),
                },
                None => {
                    return Err(ChaosError::InvalidConfig(
                        "exec needs a command".to_string(),
                    ))
                }
            },
            "delete-services" => FaultAction::DeleteAllServices,
            other => {
                return Err(ChaosError::InvalidConfig(format!(
                    "unknown action: {}",
                    other
                )))
            }
        };

        Ok(action)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            action: default_action(),
            pod_name_regex: None,
            exceptions: Vec::new(),
            seed: None,
            cpu_limit: None,
            memory_limit: None,
            disk_size_mb: default_disk_size_mb(),
            container: None,
            command: None,
            nodes: Vec::new(),
            network_interface: None,
            latency_ms: default_latency_ms(),
            latency_duration_secs: default_latency_duration_secs(),
            tc_path: default_tc_path(),
            exec_timeout_secs: None,
        }
    }
}
