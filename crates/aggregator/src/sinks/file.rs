//! FileDocumentStore - JSON-lines document store on disk

use std::path::{Path, PathBuf};

use contracts::{DocumentFilter, DocumentStore, StoredRecord, SubmissionError, SubmissionRecord};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Document store appending one JSON record per line
///
/// Counts scan the whole file. Lines that fail to parse are skipped.
#[derive(Debug)]
pub struct FileDocumentStore {
    name: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Create the store; parent directories are created on demand
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<StoredRecord>, SubmissionError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable record"
                ),
            }
        }
        Ok(records)
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

impl DocumentStore for FileDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_store_count", skip(self, filter), fields(store = %self.name))]
    async fn count_documents(&self, filter: &DocumentFilter) -> Result<u64, SubmissionError> {
        let records = self.read_records().await?;
        Ok(records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    #[instrument(name = "file_store_save", skip(self, record), fields(store = %self.name))]
    async fn save(&self, record: SubmissionRecord) -> Result<StoredRecord, SubmissionError> {
        let stored = record.into_stored();
        let line = serde_json::to_string(&stored)
            .map_err(|e| SubmissionError::sink_write(&self.name, e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        self.append_line(&line)
            .await
            .map_err(|e| SubmissionError::sink_write(&self.name, e.to_string()))?;

        debug!(id = %stored.id, path = %self.path.display(), "record appended");
        Ok(stored)
    }
}
