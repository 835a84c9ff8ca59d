//! Index module: inverted index construction, persistence and serving
//!
//! The indexer pipeline replays flushed batches into an [`InvertedIndex`].
//! A finished index is frozen into an [`IndexSnapshot`] together with its
//! link-graph scores, written as one checksummed artifact and published
//! through an [`IndexHandle`]. Readers only ever see complete snapshots.

mod document;
mod inverted;
mod persist;
mod pipeline;
mod snapshot;

pub use document::{excerpt, DocId, DocumentRecord, Field, EXCERPT_CHARS};
pub use inverted::{
    DocumentTokens, InvertedIndex, Posting, PostingList, DESCRIPTION_BOOST, TITLE_BOOST,
};
pub use persist::{load_snapshot, save_snapshot, FORMAT_VERSION};
pub use pipeline::{IndexDelta, IndexerPipeline, PipelineSummary};
pub use snapshot::{DomainLinks, IndexHandle, IndexSnapshot};

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, saving or loading an index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index encoding error: {0}")]
    Encoding(String),

    #[error("Index is corrupt: {0}")]
    Corrupt(String),

    #[error("Index format version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("No index found at {0}")]
    NotFound(PathBuf),
}

/// Result type alias for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Size and shape of a built index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub postings: usize,
    pub estimated_bytes: usize,
    pub processed_batches: usize,
    pub link_edges: usize,
    pub built_at: Option<DateTime<Utc>>,
}

impl IndexStats {
    /// Stats reported when no index is loaded
    pub fn empty() -> Self {
        Self {
            documents: 0,
            terms: 0,
            postings: 0,
            estimated_bytes: 0,
            processed_batches: 0,
            link_edges: 0,
            built_at: None,
        }
    }
}
