//! Decode errors for broker payloads.

use thiserror::Error;

/// Errors raised while decoding or encoding wire records.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not a valid record of the expected shape.
    #[error("malformed {record} payload")]
    Malformed {
        /// Record type that failed to decode.
        record: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Record could not be serialized for transport.
    #[error("failed to encode {record} payload")]
    Encode {
        /// Record type that failed to encode.
        record: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// An info response carried a modification time outside the wire format.
    #[error("invalid modification time '{value}'")]
    InvalidTimestamp {
        /// Offending timestamp payload.
        value: String,
        /// Underlying chrono parse error.
        source: chrono::ParseError,
    },
}

/// Convenience alias for protocol results.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
