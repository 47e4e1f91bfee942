//! Error taxonomy for the chaos engine
//!
//! Cluster errors are normally caught at the primitive boundary and logged.
//! Shell errors from the network control utility propagate to the caller.

use thiserror::Error;

/// Errors raised by the chaos engine and its collaborators
#[derive(Debug, Error)]
pub enum ChaosError {
    /// Listing or reading cluster state failed
    #[error("cluster query failed: {message}")]
    ClusterQuery { message: String, code: Option<u16> },

    /// Delete, patch, cordon or evict failed
    #[error("cluster mutation failed: {message}")]
    ClusterMutation { message: String, code: Option<u16> },

    /// The local network control command exited non-zero or could not start
    #[error("shell command `{command}` failed: {message}")]
    ShellExecution { command: String, message: String },

    /// The exec stream to a container failed
    #[error("exec stream failed: {0}")]
    ExecStream(String),

    /// A victim name pattern did not compile
    #[error("invalid pod name pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration cannot be turned into a fault action
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The timed wait was interrupted by a signal
    #[error("interrupted while waiting")]
    Interrupted,
}

pub type ChaosResult<T> = Result<T, ChaosError>;

impl ChaosError {
    pub fn query(err: kube::Error) -> Self {
        ChaosError::ClusterQuery {
            code: api_code(&err),
            message: describe(&err),
        }
    }

    pub fn mutation(err: kube::Error) -> Self {
        ChaosError::ClusterMutation {
            code: api_code(&err),
            message: describe(&err),
        }
    }

    /// HTTP status reported by the API server, if any
    pub fn code(&self) -> Option<u16> {
        match self {
            ChaosError::ClusterQuery { code, .. } | ChaosError::ClusterMutation { code, .. } => {
                *code
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }
}

fn api_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(ae) => Some(ae.code),
        _ => None,
    }
}

/// Render an error with the server's reason and message when available
fn describe(err: &kube::Error) -> String {
    match err {
        kube::Error::Api(ae) => format!("{} ({}): {}", ae.reason, ae.code, ae.message),
        other => other.to_string(),
    }
}
