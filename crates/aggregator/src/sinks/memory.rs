//! In-process sinks: document store, spreadsheet and object store

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{
    AppendResult, DocumentFilter, DocumentStore, ObjectId, ObjectStore, SpreadsheetClient,
    SpreadsheetConfig, StoredRecord, SubmissionError, SubmissionRecord,
};
use serde_json::Value;
use tracing::debug;

use crate::lock;

/// Document store kept in memory
///
/// Clones share the same records.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    name: String,
    records: Arc<Mutex<Vec<StoredRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of every stored record
    pub fn records(&self) -> Vec<StoredRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count_documents(&self, filter: &DocumentFilter) -> Result<u64, SubmissionError> {
        let records = lock(&self.records);
        Ok(records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn save(&self, record: SubmissionRecord) -> Result<StoredRecord, SubmissionError> {
        let stored = record.into_stored();
        lock(&self.records).push(stored.clone());
        debug!(store = %self.name, id = %stored.id, "record saved");
        Ok(stored)
    }
}

/// Named in-memory stores; `memory://name` resolves to the same store
/// for the lifetime of the registry
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    stores: Arc<Mutex<HashMap<String, MemoryDocumentStore>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, name: &str) -> MemoryDocumentStore {
        lock(&self.stores)
            .entry(name.to_string())
            .or_insert_with(|| MemoryDocumentStore::new(name))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<MemoryDocumentStore> {
        lock(&self.stores).get(name).cloned()
    }
}

/// One append call received by [`MemorySpreadsheet`]
#[derive(Debug, Clone, PartialEq)]
pub struct AppendedRows {
    pub spreadsheet_id: String,
    pub range: String,
    pub values: Vec<Vec<Value>>,
}

/// Spreadsheet that records appended rows
#[derive(Debug, Clone, Default)]
pub struct MemorySpreadsheet {
    appends: Arc<Mutex<Vec<AppendedRows>>>,
}

impl MemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appends(&self) -> Vec<AppendedRows> {
        lock(&self.appends).clone()
    }

    /// Every appended row, in append order
    pub fn rows(&self) -> Vec<Vec<Value>> {
        lock(&self.appends)
            .iter()
            .flat_map(|a| a.values.iter().cloned())
            .collect()
    }
}

impl SpreadsheetClient for MemorySpreadsheet {
    async fn append(
        &self,
        target: &SpreadsheetConfig,
        values: Vec<Vec<Value>>,
    ) -> Result<AppendResult, SubmissionError> {
        let updated_rows = values.len() as u64;
        lock(&self.appends).push(AppendedRows {
            spreadsheet_id: target.spreadsheet_id.clone(),
            range: target.range.clone(),
            values,
        });
        Ok(AppendResult {
            updated_range: Some(target.range.clone()),
            updated_rows,
        })
    }
}

/// Bucket handle backed by a map
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        lock(&self.objects).get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn save(&self, name: &str, bytes: Bytes) -> Result<ObjectId, SubmissionError> {
        lock(&self.objects).insert(name.to_string(), bytes);
        Ok(ObjectId {
            bucket: self.bucket.clone(),
            name: name.to_string(),
        })
    }
}
