//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Payload could not be read
    #[error("Failed to read payload from {path}: {source}")]
    PayloadRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Payload is not a JSON object
    #[error("Invalid payload: {message}")]
    PayloadFormat { message: String },

    /// One or more sinks failed under best-effort dispatch
    #[error("{failed} of {total} sinks failed")]
    PartialFailure { failed: usize, total: usize },

    /// Object name could not be derived
    #[error("Cannot derive an object name from {path}; pass --name")]
    ObjectName { path: PathBuf },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn payload_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PayloadRead {
            path: path.into(),
            source,
        }
    }

    pub fn payload_format(message: impl Into<String>) -> Self {
        Self::PayloadFormat {
            message: message.into(),
        }
    }
}
