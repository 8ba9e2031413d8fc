//! Error types for scheduler operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Poll timeout exceeds the update interval; polling cycles would
    /// overlap and force redundant broker reconnects.
    #[error(
        "poll timeout of {poll_timeout_ms}ms on the message broker is greater than the \
         update interval of {update_interval_secs}s"
    )]
    InvalidInterval {
        /// Configured broker poll timeout in milliseconds.
        poll_timeout_ms: u128,
        /// Configured update interval in seconds.
        update_interval_secs: u64,
    },
    /// Broker operation failed.
    #[error("broker operation failed")]
    Broker(#[from] cb_broker::BrokerError),
    /// Wire payload could not be encoded or decoded.
    #[error("protocol operation failed")]
    Protocol(#[from] cb_protocol::ProtocolError),
    /// Configuration or metadata loading failed.
    #[error("configuration operation failed")]
    Config(#[from] cb_config::ConfigError),
    /// Filesystem operation failed.
    #[error("filesystem operation failed during {operation}: {path}")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path the operation touched.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// A subprocess could not be spawned or exited unsuccessfully.
    #[error("subprocess {command} failed")]
    Subprocess {
        /// Command that failed.
        command: String,
        /// Exit status detail when available.
        detail: String,
    },
}

/// Convenience alias for scheduler results.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
