//! Storage module for persisting crawled pages
//!
//! Pages leave the crawler in fixed-size, immutable batches. The store only ever
//! appends batches (or deletes a whole batch); it never merges or edits them.
//! Downstream indexing replays the batches one at a time through [`BatchReplay`].

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteBatchStore;
pub use traits::{BatchStore, StorageError, StorageResult};

use crate::state::SessionState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Store shared between the crawl coordinator and the indexer
pub type SharedStore = Arc<Mutex<Box<dyn BatchStore>>>;

/// Wraps a store for sharing
pub fn share_store(store: impl BatchStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(Box::new(store)))
}

/// Identifier of a persisted batch
pub type BatchId = i64;

/// A fetched and extracted page
///
/// Owned by the crawl coordinator until flushed, immutable afterwards.
/// Absent metadata is `None`, never a missing field.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    /// Normalized URL; unique key of the page
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Extracted visible text
    pub text: String,
    /// Hex SHA-256 of `text`, for change detection
    pub content_hash: String,
    pub status_code: u16,
    pub fetched_at: DateTime<Utc>,
    /// Normalized absolute URLs of every outbound link
    pub outbound_links: Vec<String>,
    /// Link depth from the seed URL
    pub depth: u32,
}

impl CrawledPage {
    /// Approximate heap footprint of the record
    pub fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.url.capacity()
            + self.domain.capacity()
            + self.title.as_ref().map_or(0, |t| t.capacity())
            + self.description.as_ref().map_or(0, |d| d.capacity())
            + self.text.capacity()
            + self.content_hash.capacity()
            + self
                .outbound_links
                .iter()
                .map(|l| l.capacity() + std::mem::size_of::<String>())
                .sum::<usize>()
    }
}

/// Computes the hex SHA-256 content hash of extracted text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// An ordered, immutable group of pages written in one append
#[derive(Debug, Clone)]
pub struct PageBatch {
    pub id: BatchId,
    pub session_id: i64,
    pub created_at: DateTime<Utc>,
    pub pages: Vec<CrawledPage>,
}

/// A recorded crawl session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub status: SessionState,
    pub pages_crawled: u64,
}

/// Batch and page counts of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub sessions: u64,
    pub batches: u64,
    pub pages: u64,
}

/// Sequential reader over all batches, loading one batch at a time
///
/// The batch id list is captured when the replay starts, so batches appended
/// while replaying are left for the next replay.
pub struct BatchReplay {
    store: SharedStore,
    ids: Vec<BatchId>,
    position: usize,
}

impl BatchReplay {
    pub fn new(store: SharedStore) -> StorageResult<Self> {
        let ids = store.lock().batch_ids()?;
        Ok(Self {
            store,
            ids,
            position: 0,
        })
    }

    /// Drops batches for which `done` returns true without reading them
    pub fn skip_where(mut self, done: impl Fn(BatchId) -> bool) -> Self {
        self.ids.retain(|id| !done(*id));
        self
    }

    /// Number of batches this replay will yield
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Iterator for BatchReplay {
    type Item = StorageResult<PageBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = *self.ids.get(self.position)?;
        self.position += 1;
        Some(self.store.lock().read_batch(id))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::page;
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash("forskning og utdanning");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("forskning og utdanning"));
        assert_ne!(a, content_hash("forskning"));
    }

    #[test]
    fn test_replay_yields_batches_in_order() {
        let store = share_store(SqliteBatchStore::open_in_memory().unwrap());
        let session = store.lock().create_session("hash").unwrap();
        for i in 0..3 {
            let url = format!("https://a.test/{}", i);
            store
                .lock()
                .append_batch(session, &[page(&url, "", "tekst", &[])])
                .unwrap();
        }

        let replay = BatchReplay::new(store.clone()).unwrap();
        assert_eq!(replay.len(), 3);
        let urls: Vec<String> = replay
            .map(|b| b.unwrap().pages[0].url.clone())
            .collect();
        assert_eq!(
            urls,
            vec!["https://a.test/0", "https://a.test/1", "https://a.test/2"]
        );
    }

    #[test]
    fn test_replay_skips_done_batches() {
        let store = share_store(SqliteBatchStore::open_in_memory().unwrap());
        let session = store.lock().create_session("hash").unwrap();
        let first = store
            .lock()
            .append_batch(session, &[page("https://a.test/0", "", "tekst", &[])])
            .unwrap();
        let second = store
            .lock()
            .append_batch(session, &[page("https://a.test/1", "", "tekst", &[])])
            .unwrap();

        let replay = BatchReplay::new(store).unwrap().skip_where(|id| id == first);
        let ids: Vec<BatchId> = replay.map(|b| b.unwrap().id).collect();
        assert_eq!(ids, vec![second]);
    }

    #[test]
    fn test_estimated_bytes_grows_with_text() {
        let small = page("https://a.test/", "", "kort", &[]);
        let large = page("https://a.test/", "", &"lang tekst ".repeat(100), &[]);
        assert!(large.estimated_bytes() > small.estimated_bytes() + 1_000);
    }
}
