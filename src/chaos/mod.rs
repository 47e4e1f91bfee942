//! Chaos engineering module
//!
//! Selects victims and applies faults:
//! - Pod termination and node eviction
//! - Service and node deletion
//! - Resource limit starvation
//! - Disk pressure and arbitrary commands via exec
//! - Network latency with guaranteed revert

mod conditions;
mod engine;
mod network;
mod primitives;
mod selector;
mod types;

pub use conditions::{
    fill_disk_command, limit_path, resource_limit_patch, shell_command, DISK_PRESSURE_DIR,
    DISK_PRESSURE_FILE,
};
pub use engine::ChaosEngine;
pub use network::{
    parse_default_route, pause_until, shutdown_signal, NetworkControl, NetworkFaultController,
    NetworkFaultState, Pause, SignalAwarePause, TcNetworkControl,
};
pub use primitives::FaultInjector;
pub use selector::{select_random_pod, VictimFilter};
pub use types::*;
