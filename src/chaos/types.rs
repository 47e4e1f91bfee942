//! Fault action and outcome types

use std::time::Duration;

/// A disruptive action the engine can apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultAction {
    /// Delete a randomly selected running pod
    Terminate,
    /// Cordon a node and evict its pods with zero grace period
    Evict { node: String },
    /// Delete the named nodes from the cluster
    DeleteNodes { nodes: Vec<String> },
    /// Add network latency on a local interface for a fixed time, then revert.
    /// Without an interface, the default-route interface is used.
    InjectLatency {
        interface: Option<String>,
        delay_ms: u32,
        duration: Duration,
    },
    /// Fill a selected pod's disk with `size_mb` of zeros
    DiskPressure {
        size_mb: u64,
        container: Option<String>,
    },
    /// Patch a selected pod's CPU and/or memory limits
    ResourceLimit {
        cpu: Option<String>,
        memory: Option<String>,
    },
    /// Run a shell command inside a selected pod
    Exec {
        command: String,
        container: Option<String>,
    },
    /// Delete every service in the configured namespaces
    DeleteAllServices,
}

impl FaultAction {
    pub fn kind(&self) -> &'static str {
        match self {
            FaultAction::Terminate => "terminate",
            FaultAction::Evict { .. } => "evict",
            FaultAction::DeleteNodes { .. } => "delete-nodes",
            FaultAction::InjectLatency { .. } => "network-latency",
            FaultAction::DiskPressure { .. } => "disk-pressure",
            FaultAction::ResourceLimit { .. } => "resource-limit",
            FaultAction::Exec { .. } => "exec",
            FaultAction::DeleteAllServices => "delete-services",
        }
    }
}

impl std::fmt::Display for FaultAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// What a fault was applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pod { name: String, namespace: String },
    Node(String),
    Nodes(Vec<String>),
    Namespaces(Vec<String>),
    Interface(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Pod { name, namespace } => write!(f, "pod {}/{}", namespace, name),
            Target::Node(node) => write!(f, "node {}", node),
            Target::Nodes(nodes) => write!(f, "nodes {}", nodes.join(",")),
            Target::Namespaces(namespaces) => write!(f, "namespaces {}", namespaces.join(",")),
            Target::Interface(interface) => write!(f, "interface {}", interface),
        }
    }
}

/// Result of running one fault action.
///
/// `Applied` means the action was issued, not that it took effect: cluster
/// errors inside primitives are logged and swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No eligible victim; nothing was done
    NoVictim,
    Applied(Target),
    Skipped { reason: String },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::NoVictim => write!(f, "no victim"),
            Outcome::Applied(target) => write!(f, "applied to {}", target),
            Outcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_action_kind() {
        assert_eq!(FaultAction::Terminate.to_string(), "terminate");
        assert_eq!(FaultAction::DeleteAllServices.to_string(), "delete-services");
        assert_eq!(
            FaultAction::Evict {
                node: "n1".to_string()
            }
            .kind(),
            "evict"
        );
    }

    #[test]
    fn test_outcome_display() {
        let outcome = Outcome::Applied(Target::Pod {
            name: "web-1".to_string(),
            namespace: "shop".to_string(),
        });
        assert_eq!(outcome.to_string(), "applied to pod shop/web-1");
        assert_eq!(Outcome::NoVictim.to_string(), "no victim");
    }
}
