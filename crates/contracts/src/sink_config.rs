//! SinkConfig - which sinks a submission is routed to
//!
//! Every sub-config is independently optional; an absent sub-config means the
//! sink is skipped entirely.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::SubmissionError;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete survey configuration: sink routing plus form-side settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SurveyConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub sinks: SinkConfig,

    #[serde(default)]
    pub form: FormConfig,
}

/// How sink failures affect the rest of the fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Attempt every configured sink, capture failures per sink
    #[default]
    BestEffortAll,
    /// Write sinks in order, stop at the first failure and return it
    AbortOnFirstFailure,
}

/// Sink routing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    #[serde(default)]
    pub policy: DispatchPolicy,

    #[serde(default)]
    #[validate(nested)]
    pub document_store: Option<DocumentStoreConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub spreadsheet: Option<SpreadsheetConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub object_store: Option<ObjectStoreConfig>,
}

impl SinkConfig {
    /// Whether the submission must pass the duplicate guard
    pub fn enforces_uniqueness(&self) -> bool {
        self.document_store
            .as_ref()
            .is_some_and(|d| d.enforce_uniqueness)
    }
}

/// Document store sub-config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DocumentStoreConfig {
    /// Connection URI (`memory://name`, `file:///path/to/records.jsonl`)
    #[validate(length(min = 1, message = "uri cannot be empty"))]
    pub uri: String,

    /// Reject submissions whose email already exists
    #[serde(default)]
    pub enforce_uniqueness: bool,

    /// Survey the records belong to
    #[serde(default)]
    pub survey_id: Option<String>,
}

impl DocumentStoreConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            enforce_uniqueness: false,
            survey_id: None,
        }
    }

    pub fn with_uniqueness(mut self) -> Self {
        self.enforce_uniqueness = true;
        self
    }
}

/// Spreadsheet sub-config
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct SpreadsheetConfig {
    #[serde(alias = "spreadsheetId")]
    #[validate(length(min = 1, message = "spreadsheet_id cannot be empty"))]
    pub spreadsheet_id: String,

    /// A1 range the row is appended to (e.g. `Sheet1!A1`)
    #[validate(length(min = 1, message = "range cannot be empty"))]
    pub range: String,

    #[serde(default, alias = "apiKey")]
    pub api_key: String,

    #[serde(default, alias = "accessToken")]
    pub access_token: Option<String>,
}

impl fmt::Debug for SpreadsheetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("api_key", &"<redacted>")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Object store sub-config
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct ObjectStoreConfig {
    #[serde(alias = "bucketName")]
    #[validate(length(min = 1, message = "bucket cannot be empty"))]
    pub bucket: String,

    /// Bearer credentials for the storage API
    #[validate(length(min = 1, message = "credentials cannot be empty"))]
    pub credentials: String,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("bucket", &self.bucket)
            .field("credentials", &"<redacted>")
            .finish()
    }
}

/// Form-side settings used by the event binder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Upload endpoint; uploads are not proxied when absent
    #[serde(default)]
    pub upload_url: Option<Url>,

    /// Question CSS class overrides (class key -> class names)
    #[serde(default)]
    pub css_classes: BTreeMap<String, String>,
}

/// Options of the sequential submission entry point
///
/// Mirrors the camelCase JSON shape
/// `{mongo, mongoUri, checkDuplicate, googleSheet, gcp}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOptions {
    #[serde(default)]
    pub mongo: bool,

    #[serde(default)]
    pub mongo_uri: Option<String>,

    #[serde(default)]
    pub check_duplicate: bool,

    #[serde(default)]
    pub google_sheet: Option<SpreadsheetConfig>,

    #[serde(default)]
    pub gcp: Option<ObjectStoreConfig>,

    #[serde(default)]
    pub survey_id: Option<String>,
}

impl SubmissionOptions {
    /// Translate into a `SinkConfig` with `AbortOnFirstFailure` semantics
    ///
    /// `fallback_uri` is used when `mongo` is set without `mongoUri`.
    ///
    /// # Errors
    /// `Configuration` when the document store is requested without a URI, or
    /// duplicate checking is requested without the document store.
    /// `ConfigValidation` when a sub-config breaks a field rule (e.g. an empty
    /// `spreadsheetId`).
    pub fn to_sink_config(&self, fallback_uri: Option<String>) -> Result<SinkConfig, SubmissionError> {
        if self.check_duplicate && !self.mongo {
            return Err(SubmissionError::configuration(
                "checkDuplicate",
                "duplicate checking requires the document store (mongo = true)",
            ));
        }

        let document_store = if self.mongo {
            let uri = self
                .mongo_uri
                .clone()
                .or(fallback_uri)
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    SubmissionError::configuration("mongoUri", "document store URI is not set")
                })?;
            Some(DocumentStoreConfig {
                uri,
                enforce_uniqueness: self.check_duplicate,
                survey_id: self.survey_id.clone(),
            })
        } else {
            None
        };

        let config = SinkConfig {
            policy: DispatchPolicy::AbortOnFirstFailure,
            document_store,
            spreadsheet: self.google_sheet.clone(),
            object_store: self.gcp.clone(),
        };
        config
            .validate()
            .map_err(|e| SubmissionError::config_validation("options", e.to_string()))?;
        Ok(config)
    }
}
