//! Sink implementations
//!
//! Document stores (memory, JSON-lines file, MongoDB), the Sheets client, the Cloud
//! Storage bucket handle and their in-memory counterparts.

mod document;
mod file;
mod gcs;
mod memory;
mod mongo;
mod sheets;

pub use self::document::DocumentBackend;
pub use self::file::FileDocumentStore;
pub use self::gcs::{GcsObjectStore, DEFAULT_STORAGE_BASE_URL};
pub use self::memory::{
    AppendedRows, MemoryDocumentStore, MemoryObjectStore, MemoryRegistry, MemorySpreadsheet,
};
pub use self::mongo::{MongoDocumentStore, DEFAULT_DATABASE, SUBMISSIONS_COLLECTION};
pub use self::sheets::{GoogleSheetsClient, DEFAULT_SHEETS_BASE_URL};
