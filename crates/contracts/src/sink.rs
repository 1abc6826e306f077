//! Sink collaborator traits
//!
//! Boundaries of the external persistence targets. Drivers, connection pools
//! and wire formats live behind these traits.

use bytes::Bytes;
use serde_json::Value;

use crate::{
    AppendResult, DocumentFilter, ObjectId, SpreadsheetConfig, StoredRecord, SubmissionError,
    SubmissionRecord,
};

/// Document store contract (`countDocuments` / `save`)
#[trait_variant::make(DocumentStore: Send)]
pub trait LocalDocumentStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Count records matching the filter
    async fn count_documents(&self, filter: &DocumentFilter) -> Result<u64, SubmissionError>;

    /// Persist one record, assigning its id and creation timestamp
    ///
    /// # Errors
    /// Returns `SinkWrite` on any driver failure
    async fn save(&self, record: SubmissionRecord) -> Result<StoredRecord, SubmissionError>;
}

/// Spreadsheet contract (`append`)
#[trait_variant::make(SpreadsheetClient: Send)]
pub trait LocalSpreadsheetClient {
    /// Append rows to the target range
    async fn append(
        &self,
        target: &SpreadsheetConfig,
        values: Vec<Vec<Value>>,
    ) -> Result<AppendResult, SubmissionError>;
}

/// Object store contract
///
/// An instance is a bucket handle: it is bound to one bucket and one set of
/// credentials when it is created.
#[trait_variant::make(ObjectStore: Send)]
pub trait LocalObjectStore {
    /// Bucket this handle writes to
    fn bucket(&self) -> &str;

    /// Save `bytes` under `name`
    async fn save(&self, name: &str, bytes: Bytes) -> Result<ObjectId, SubmissionError>;
}
