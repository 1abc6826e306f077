//! Connectors with failing sinks for unit tests

use contracts::{
    DocumentFilter, DocumentStore, DocumentStoreConfig, ObjectStoreConfig, SpreadsheetConfig,
    StoredRecord, SubmissionError, SubmissionRecord,
};

use crate::context::{MemoryConnector, SinkConnector};
use crate::sinks::{MemoryObjectStore, MemorySpreadsheet};

/// Document store whose saves always fail
pub(crate) struct FailingDocuments;

impl DocumentStore for FailingDocuments {
    fn name(&self) -> &str {
        "broken"
    }

    async fn count_documents(&self, _filter: &DocumentFilter) -> Result<u64, SubmissionError> {
        Ok(0)
    }

    async fn save(&self, _record: SubmissionRecord) -> Result<StoredRecord, SubmissionError> {
        Err(SubmissionError::Other("disk full".to_string()))
    }
}

/// Failing document store, in-memory spreadsheet and buckets
#[derive(Default)]
pub(crate) struct FailingDocumentsConnector {
    inner: MemoryConnector,
}

impl FailingDocumentsConnector {
    pub(crate) fn sheets(&self) -> &MemorySpreadsheet {
        self.inner.sheets()
    }
}

impl SinkConnector for FailingDocumentsConnector {
    type Documents = FailingDocuments;
    type Sheets = MemorySpreadsheet;
    type Objects = MemoryObjectStore;

    fn connect_documents(
        &self,
        _config: &DocumentStoreConfig,
    ) -> Result<FailingDocuments, SubmissionError> {
        Ok(FailingDocuments)
    }

    fn connect_sheets(&self, config: &SpreadsheetConfig) -> Result<MemorySpreadsheet, SubmissionError> {
        self.inner.connect_sheets(config)
    }

    fn connect_objects(
        &self,
        config: &ObjectStoreConfig,
    ) -> Result<MemoryObjectStore, SubmissionError> {
        self.inner.connect_objects(config)
    }
}
