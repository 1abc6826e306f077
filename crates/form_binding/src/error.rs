//! Form binding error types

use thiserror::Error;

/// Channel registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// The form engine exposes no channel of this name
    #[error("form channel not found: '{name}'")]
    ChannelNotFound { name: String },
}

impl BindError {
    pub fn channel_not_found(name: impl Into<String>) -> Self {
        Self::ChannelNotFound { name: name.into() }
    }
}

/// Upload proxy transport failures
///
/// Reported back to the form engine through the upload callback, never
/// propagated into the surrounding UI code.
#[derive(Debug, Error)]
pub enum UploadTransportError {
    /// Upload event carried no files
    #[error("upload event carries no files")]
    EmptyUpload,

    /// Request could not be built or sent
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("upload endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("upload response could not be decoded: {message}")]
    Decode { message: String },

    /// No async runtime to run the request on
    #[error("no tokio runtime available for the upload")]
    NoRuntime,
}
