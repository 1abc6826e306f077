//! # Aggregator
//!
//! 提交聚合模块。
//!
//! 负责：
//! - 唯一性前置检查 (`DuplicateGuard`)，同一 key 的检查与写入串行化
//! - Fan-out 到文档存储与电子表格
//! - 对象存储上传 (独立于 fan-out)
//! - Sink 客户端的懒加载与按配置复用

pub mod aggregator;
pub mod context;
pub mod entry;
pub mod guard;
pub mod key_lock;
pub mod sinks;

#[cfg(test)]
mod test_support;

use std::sync::{Mutex, MutexGuard};

pub use aggregator::SubmissionAggregator;
pub use context::{HttpConnector, MemoryConnector, SinkConnector, SinkContext};
pub use entry::{handle_survey_submission, SubmissionOutcome, MONGODB_URI_ENV};
pub use guard::DuplicateGuard;
pub use key_lock::{KeyGuard, KeyLocks};
pub use sinks::{
    AppendedRows, DocumentBackend, FileDocumentStore, GcsObjectStore, GoogleSheetsClient,
    MemoryDocumentStore, MemoryObjectStore, MemoryRegistry, MemorySpreadsheet, MongoDocumentStore,
};

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
