//! Error types for broker operations.

use thiserror::Error;

/// Primary error type for broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Operation attempted on a connection that was already closed.
    #[error("broker connection closed")]
    Closed,
    /// Transport-level failure while talking to the broker.
    #[error("broker transport failed during {operation}")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Transport detail.
        detail: String,
    },
}

/// Convenience alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;
