//! Pending-page buffer between crawl workers and the batch store
//!
//! Pages are flushed as soon as a full batch is pending, so under normal
//! operation at most `batch_size` pages are held. When the store fails the
//! pages stay buffered and the flush is retried on the next push; the buffer
//! never grows past twice the batch size. A page refused by a full buffer is
//! counted, so an aborted session reports every page it failed to persist.

use crate::storage::{CrawledPage, SharedStore, StorageError};

/// Buffered pages awaiting a batch flush
#[derive(Debug)]
pub struct PageBuffer {
    pages: Vec<CrawledPage>,
    batch_size: usize,
    hard_limit: usize,
    peak: usize,
    batches_flushed: usize,
    pages_flushed: usize,
    failed_flushes: usize,
    rejected: usize,
}

impl PageBuffer {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pages: Vec::with_capacity(batch_size),
            batch_size,
            hard_limit: batch_size * 2,
            peak: 0,
            batches_flushed: 0,
            pages_flushed: 0,
            failed_flushes: 0,
            rejected: 0,
        }
    }

    /// Buffers a page, flushing full batches to the store
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The page is buffered or persisted
    /// * `Err(StorageError)` - The store keeps failing and the buffer is full;
    ///   the session must abort. Already buffered pages are kept. A page that
    ///   no longer fits is counted in [`PageBuffer::rejected`].
    pub fn push(
        &mut self,
        page: CrawledPage,
        store: &SharedStore,
        session_id: i64,
    ) -> Result<(), StorageError> {
        if self.pages.len() >= self.hard_limit {
            if let Err(e) = self.flush_full_batches(store, session_id) {
                self.failed_flushes += 1;
                self.rejected += 1;
                tracing::error!("Buffer full, {} not persisted: {}", page.url, e);
                return Err(e);
            }
        }

        self.pages.push(page);
        self.peak = self.peak.max(self.pages.len());

        if let Err(e) = self.flush_full_batches(store, session_id) {
            self.failed_flushes += 1;
            if self.pages.len() >= self.hard_limit {
                return Err(e);
            }
            tracing::warn!(
                "Batch flush failed ({} pages pending), will retry: {}",
                self.pages.len(),
                e
            );
        }
        Ok(())
    }

    /// Writes every remaining page, in batches of at most `batch_size`
    pub fn flush_all(&mut self, store: &SharedStore, session_id: i64) -> Result<(), StorageError> {
        while !self.pages.is_empty() {
            let count = self.pages.len().min(self.batch_size);
            self.write_batch(count, store, session_id)?;
        }
        Ok(())
    }

    fn flush_full_batches(&mut self, store: &SharedStore, session_id: i64) -> Result<(), StorageError> {
        while self.pages.len() >= self.batch_size {
            self.write_batch(self.batch_size, store, session_id)?;
        }
        Ok(())
    }

    /// Persists the first `count` pages; they stay buffered on failure
    fn write_batch(
        &mut self,
        count: usize,
        store: &SharedStore,
        session_id: i64,
    ) -> Result<(), StorageError> {
        let batch_id = store
            .lock()
            .append_batch(session_id, &self.pages[..count])?;
        self.pages.drain(..count);
        self.batches_flushed += 1;
        self.pages_flushed += count;
        tracing::debug!("Flushed batch {} ({} pages)", batch_id, count);
        Ok(())
    }

    /// Pages currently held in memory
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Largest number of pages held at once
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn batches_flushed(&self) -> usize {
        self.batches_flushed
    }

    pub fn pages_flushed(&self) -> usize {
        self.pages_flushed
    }

    pub fn failed_flushes(&self) -> usize {
        self.failed_flushes
    }

    /// Pages refused because the buffer was full and the store failing
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Crawled pages that are not in the store: buffered plus rejected
    pub fn unpersisted(&self) -> usize {
        self.pages.len() + self.rejected
    }
}
