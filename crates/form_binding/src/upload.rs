//! UploadProxy - forwards form upload events to an HTTP endpoint
//!
//! Every `UploadEvent` gets exactly one report: `success(files)` or `error()`.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::UploadTransportError;
use crate::form::lock;

/// Multipart field the files are sent under
pub const FILES_FIELD: &str = "files";

/// One file selected in the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// One entry of the upload endpoint's response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_id: String,
    pub content: Value,
}

/// Terminal report of one upload event
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Success(Vec<UploadedFile>),
    Error,
}

type ReportFn = Box<dyn FnOnce(UploadStatus) + Send>;

struct CallbackSlot {
    report: Mutex<Option<ReportFn>>,
}

impl CallbackSlot {
    fn fire(&self, status: UploadStatus) -> bool {
        let report = lock(&self.report).take();
        match report {
            Some(report) => {
                report(status);
                true
            }
            None => false,
        }
    }
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        let pending = self
            .report
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(report) = pending {
            warn!("upload event dropped without a report, signalling error");
            report(UploadStatus::Error);
        }
    }
}

/// At-most-once callback slot of an upload event
///
/// Clones share the slot: whichever clone reports first wins, later reports are
/// ignored. When the last clone is dropped without a report, `Error` is
/// reported so the form never stays in the uploading state.
#[derive(Clone)]
pub struct UploadCallback {
    slot: Arc<CallbackSlot>,
}

impl UploadCallback {
    pub fn new<F>(report: F) -> Self
    where
        F: FnOnce(UploadStatus) + Send + 'static,
    {
        Self {
            slot: Arc::new(CallbackSlot {
                report: Mutex::new(Some(Box::new(report))),
            }),
        }
    }

    /// Report success; returns false if the event was already reported
    pub fn success(&self, files: Vec<UploadedFile>) -> bool {
        self.slot.fire(UploadStatus::Success(files))
    }

    /// Report failure; returns false if the event was already reported
    pub fn error(&self) -> bool {
        self.slot.fire(UploadStatus::Error)
    }

    pub fn is_reported(&self) -> bool {
        lock(&self.slot.report).is_none()
    }
}

impl fmt::Debug for UploadCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCallback")
            .field("reported", &self.is_reported())
            .finish()
    }
}

/// Upload channel options: `{files, callback}`
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub files: Vec<FileBlob>,
    pub callback: UploadCallback,
}

impl UploadEvent {
    pub fn new(files: Vec<FileBlob>, callback: UploadCallback) -> Self {
        Self { files, callback }
    }
}

/// Proxies upload events to the configured endpoint
#[derive(Debug, Clone)]
pub struct UploadProxy {
    client: Client,
    endpoint: Url,
}

impl UploadProxy {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send all files in one multipart POST and decode the response
    ///
    /// Single attempt, no retry.
    #[instrument(
        name = "upload_proxy_upload",
        skip(self, files),
        fields(endpoint = %self.endpoint, files = files.len())
    )]
    pub async fn upload(&self, files: &[FileBlob]) -> Result<Vec<UploadedFile>, UploadTransportError> {
        if files.is_empty() {
            return Err(UploadTransportError::EmptyUpload);
        }

        let form = Self::build_form(files)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UploadTransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| UploadTransportError::Decode {
            message: e.to_string(),
        })
    }

    /// Run one upload event to its terminal report
    pub async fn handle(&self, event: UploadEvent) {
        match self.upload(&event.files).await {
            Ok(files) => {
                debug!(files = files.len(), "upload succeeded");
                observability::record_upload(true);
                event.callback.success(files);
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "upload failed");
                observability::record_upload(false);
                event.callback.error();
            }
        }
    }

    /// Handle the event on a background task
    ///
    /// Returns `None` (after reporting `error`) when called outside a tokio
    /// runtime.
    pub fn spawn(&self, event: UploadEvent) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(error = %UploadTransportError::NoRuntime, "upload not started");
            event.callback.error();
            return None;
        };

        let proxy = self.clone();
        Some(runtime.spawn(async move { proxy.handle(event).await }))
    }

    fn build_form(files: &[FileBlob]) -> Result<multipart::Form, UploadTransportError> {
        let mut form = multipart::Form::new();
        for file in files {
            let body = reqwest::Body::from(file.bytes.clone());
            let part = multipart::Part::stream_with_length(body, file.bytes.len() as u64)
                .file_name(file.name.clone())
                .mime_str(&file.content_type)?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }
}
