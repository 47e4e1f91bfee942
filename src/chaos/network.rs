//! Network latency fault with guaranteed revert
//!
//! The delay rule is applied with `tc netem` on a local interface. Once the
//! rule is in place the controller always tries to remove it, whether the
//! timed wait finished normally or was interrupted.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

use super::conditions::{netem_add_args, netem_del_args};
use crate::error::{ChaosError, ChaosResult};

const ROUTE_TABLE: &str = "/proc/net/route";

/// Local utility that adds and removes delay rules on an interface
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkControl: Send + Sync {
    async fn add_delay(&self, interface: &str, delay_ms: u32) -> ChaosResult<()>;

    async fn remove_delay(&self, interface: &str) -> ChaosResult<()>;

    /// Interface to use when none is configured
    async fn default_interface(&self) -> Option<String>;
}

/// The blocking wait between apply and revert
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration) -> ChaosResult<()>;
}

/// Sleeps for the full duration unless SIGINT or SIGTERM arrives first
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalAwarePause;

#[async_trait]
impl Pause for SignalAwarePause {
    async fn pause(&self, duration: Duration) -> ChaosResult<()> {
        pause_until(duration, shutdown_signal()).await
    }
}

/// Sleep for `duration` unless `interrupt` resolves first, which is reported
/// as [`ChaosError::Interrupted`]
pub async fn pause_until<F>(duration: Duration, interrupt: F) -> ChaosResult<()>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = interrupt => Err(ChaosError::Interrupted),
    }
}

/// Resolves on Ctrl-C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Runs `tc` as a child process
#[derive(Debug, Clone)]
pub struct TcNetworkControl {
    tc_path: String,
}

impl Default for TcNetworkControl {
    fn default() -> Self {
        Self::new("tc")
    }
}

impl TcNetworkControl {
    pub fn new(tc_path: impl Into<String>) -> Self {
        Self {
            tc_path: tc_path.into(),
        }
    }

    pub fn tc_path(&self) -> &str {
        &self.tc_path
    }

    async fn run(&self, args: Vec<String>) -> ChaosResult<()> {
        let rendered = format!("{} {}", self.tc_path, args.join(" "));
        debug!(command = %rendered, "Running network control command");

        let output = Command::new(&self.tc_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ChaosError::ShellExecution {
                command: rendered.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ChaosError::ShellExecution {
                command: rendered,
                message: format!("{}: {}", output.status, stderr.trim()),
            })
        }
    }
}

#[async_trait]
impl NetworkControl for TcNetworkControl {
    async fn add_delay(&self, interface: &str, delay_ms: u32) -> ChaosResult<()> {
        self.run(netem_add_args(interface, delay_ms)).await
    }

    async fn remove_delay(&self, interface: &str) -> ChaosResult<()> {
        self.run(netem_del_args(interface)).await
    }

    async fn default_interface(&self) -> Option<String> {
        match tokio::fs::read_to_string(ROUTE_TABLE).await {
            Ok(table) => parse_default_route(&table),
            Err(e) => {
                warn!(error = %e, "Cannot read {}", ROUTE_TABLE);
                None
            }
        }
    }
}

/// Interface of the first default route (destination 0.0.0.0) in a
/// `/proc/net/route` table
pub fn parse_default_route(table: &str) -> Option<String> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let interface = fields.next()?;
        let destination = fields.next()?;
        (destination == "00000000" && interface != "lo").then(|| interface.to_string())
    })
}

/// An applied delay rule awaiting revert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFaultState {
    pub interface: String,
    pub active: bool,
}

/// Drives the apply → wait → revert lifecycle of a network latency fault
pub struct NetworkFaultController<N, P = SignalAwarePause> {
    control: N,
    pause: P,
    state: Option<NetworkFaultState>,
}

impl<N: NetworkControl, P: Pause> NetworkFaultController<N, P> {
    pub fn new(control: N, pause: P) -> Self {
        Self {
            control,
            pause,
            state: None,
        }
    }

    pub fn control(&self) -> &N {
        &self.control
    }

    /// The rule currently in place, if any
    pub fn state(&self) -> Option<&NetworkFaultState> {
        self.state.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_none()
    }

    /// Add `delay_ms` of latency on `interface`, hold it for `duration`, then
    /// remove it.
    ///
    /// If the rule cannot be added nothing is reverted and the shell error is
    /// returned. Once added, removal is always attempted and the controller
    /// ends idle. A wait error takes precedence over a revert error; both are
    /// logged.
    pub async fn run_timed_network_fault(
        &mut self,
        interface: &str,
        delay_ms: u32,
        duration: Duration,
    ) -> ChaosResult<()> {
        self.control.add_delay(interface, delay_ms).await?;
        self.state = Some(NetworkFaultState {
            interface: interface.to_string(),
            active: true,
        });
        info!(interface, delay_ms, ?duration, "Injected network latency");

        let waited = self.pause.pause(duration).await;
        if let Err(e) = &waited {
            warn!(interface, error = %e, "Wait ended early, reverting network latency");
        }

        let reverted = self.control.remove_delay(interface).await;
        self.state = None;
        match &reverted {
            Ok(()) => info!(interface, "Removed network latency"),
            Err(e) => error!(interface, error = %e, "Failed to remove network latency"),
        }

        waited.and(reverted)
    }
}
