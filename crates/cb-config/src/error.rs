//! Error types for configuration and metadata loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration or metadata file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// File content was not valid YAML of the expected shape.
    #[error("failed to parse {path}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// A required field was present but empty.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section containing the field.
        section: &'static str,
        /// Name of the offending field.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Package directory carries no metadata file.
    #[error("package metadata does not exist: {path}")]
    MetadataMissing {
        /// Expected metadata file location.
        path: PathBuf,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
