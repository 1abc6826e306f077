//! DocumentBackend - document store selected by URI scheme

use contracts::{DocumentFilter, DocumentStore, StoredRecord, SubmissionError, SubmissionRecord};

use super::{FileDocumentStore, MemoryDocumentStore, MemoryRegistry, MongoDocumentStore};

/// Document store resolved from a connection URI
#[derive(Debug)]
pub enum DocumentBackend {
    /// `memory://name`
    Memory(MemoryDocumentStore),
    /// `file://path`
    File(FileDocumentStore),
    /// `mongodb://...` or `mongodb+srv://...`
    Mongo(MongoDocumentStore),
}

impl DocumentBackend {
    /// Resolve `uri` to a backend
    ///
    /// # Errors
    /// `Configuration` for an empty URI, an unknown scheme or a missing name/path.
    pub fn connect(uri: &str, memory: &MemoryRegistry) -> Result<Self, SubmissionError> {
        let uri = uri.trim();
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            SubmissionError::configuration("document_store.uri", format!("'{uri}' has no scheme"))
        })?;

        if rest.is_empty() {
            return Err(SubmissionError::configuration(
                "document_store.uri",
                format!("'{uri}' names no store"),
            ));
        }

        match scheme {
            "memory" => Ok(Self::Memory(memory.get_or_create(rest))),
            "file" => Ok(Self::File(FileDocumentStore::new(uri, rest))),
            "mongodb" | "mongodb+srv" => Ok(Self::Mongo(MongoDocumentStore::new(uri))),
            other => Err(SubmissionError::configuration(
                "document_store.uri",
                format!("unsupported scheme '{other}'"),
            )),
        }
    }
}

impl DocumentStore for DocumentBackend {
    fn name(&self) -> &str {
        match self {
            Self::Memory(store) => store.name(),
            Self::File(store) => store.name(),
            Self::Mongo(store) => store.name(),
        }
    }

    async fn count_documents(&self, filter: &DocumentFilter) -> Result<u64, SubmissionError> {
        match self {
            Self::Memory(store) => store.count_documents(filter).await,
            Self::File(store) => store.count_documents(filter).await,
            Self::Mongo(store) => store.count_documents(filter).await,
        }
    }

    async fn save(&self, record: SubmissionRecord) -> Result<StoredRecord, SubmissionError> {
        match self {
            Self::Memory(store) => store.save(record).await,
            Self::File(store) => store.save(record).await,
            Self::Mongo(store) => store.save(record).await,
        }
    }
}
