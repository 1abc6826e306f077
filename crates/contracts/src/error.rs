//! Layered error definitions
//!
//! Categorized by source: precondition / sink / config / general

use thiserror::Error;

/// Unified submission error type
#[derive(Debug, Error)]
pub enum SubmissionError {
    // ===== Precondition Errors =====
    /// Uniqueness key required but absent from the payload
    #[error("uniqueness key '{field}' missing from payload")]
    MissingKey { field: String },

    /// Uniqueness key already present in the document store
    #[error("duplicate submission for '{key}'")]
    DuplicateSubmission { key: String },

    // ===== Sink Errors =====
    /// Sink write error (network, auth, quota, ...)
    #[error("sink '{sink}' write error: {message}")]
    SinkWrite { sink: String, message: String },

    // ===== Configuration Errors =====
    /// Required connection string / credentials absent at call time
    #[error("configuration error at '{field}': {message}")]
    Configuration { field: String, message: String },

    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl SubmissionError {
    /// Create missing key error
    pub fn missing_key(field: impl Into<String>) -> Self {
        Self::MissingKey {
            field: field.into(),
        }
    }

    /// Create duplicate submission error
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateSubmission { key: key.into() }
    }

    /// Create sink write error
    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create configuration error
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole submission before any sink write
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingKey { .. } | Self::DuplicateSubmission { .. }
        )
    }
}
