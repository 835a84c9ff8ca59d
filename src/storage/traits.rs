//! Storage traits and error types

use crate::state::SessionState;
use crate::storage::{BatchId, CrawledPage, PageBatch, SessionRecord, StoreStats};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Refusing to append an empty batch")]
    EmptyBatch,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only, batch-oriented persistence of crawled pages
///
/// Batches are written once in a single transaction and never modified.
pub trait BatchStore: Send {
    // ===== Session Management =====

    /// Records the start of a crawl session and returns its id
    fn create_session(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the final state of a session
    fn finish_session(
        &mut self,
        session_id: i64,
        status: SessionState,
        pages_crawled: u64,
    ) -> StorageResult<()>;

    /// Gets the most recent session
    fn latest_session(&self) -> StorageResult<Option<SessionRecord>>;

    // ===== Batches =====

    /// Appends `pages` as one new batch, preserving their order
    fn append_batch(&mut self, session_id: i64, pages: &[CrawledPage]) -> StorageResult<BatchId>;

    /// Ids of all stored batches in append order
    fn batch_ids(&self) -> StorageResult<Vec<BatchId>>;

    /// Loads one batch with its pages in their original order
    fn read_batch(&self, batch_id: BatchId) -> StorageResult<PageBatch>;

    /// Deletes a batch and all of its pages
    fn delete_batch(&mut self, batch_id: BatchId) -> StorageResult<()>;

    // ===== Statistics =====

    fn stats(&self) -> StorageResult<StoreStats>;
}
