//! Indexer pipeline: replays flushed batches into an inverted index
//!
//! The pipeline only reads batches that are already in the store, never the
//! crawler's pending buffer. Batch ids are tracked inside the index, so
//! handing the same batch in twice is a reported no-op.

use super::{DocId, DocumentRecord, DocumentTokens, InvertedIndex};
use crate::config::IndexerConfig;
use crate::storage::{BatchId, BatchReplay, CrawledPage, StorageResult};
use crate::text::Tokenizer;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// What one `index_batch` call changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    pub batch_id: BatchId,
    /// The batch had been indexed before and was ignored
    pub skipped: bool,
    pub documents_added: usize,
    /// Documents whose earlier version was replaced
    pub documents_replaced: usize,
    /// Pages with no indexable tokens
    pub empty_pages: usize,
    /// Net change in distinct terms
    pub terms_added: usize,
}

/// Totals over a whole replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub batches_indexed: usize,
    /// Batches left out because they were already in the index
    pub batches_skipped: usize,
    pub documents_added: usize,
    pub documents_replaced: usize,
    pub empty_pages: usize,
}

impl PipelineSummary {
    fn absorb(&mut self, delta: &IndexDelta) {
        if delta.skipped {
            self.batches_skipped += 1;
            return;
        }
        self.batches_indexed += 1;
        self.documents_added += delta.documents_added;
        self.documents_replaced += delta.documents_replaced;
        self.empty_pages += delta.empty_pages;
    }
}

/// Single writer of an [`InvertedIndex`] under construction
pub struct IndexerPipeline {
    index: InvertedIndex,
    tokenizer: Arc<dyn Tokenizer>,
    config: IndexerConfig,
    chunks_since_release: usize,
    releases: usize,
}

impl IndexerPipeline {
    /// Starts a full build from an empty index
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: IndexerConfig) -> Self {
        Self::resume(InvertedIndex::new(), tokenizer, config)
    }

    /// Continues building on a copy of an existing index
    pub fn resume(index: InvertedIndex, tokenizer: Arc<dyn Tokenizer>, config: IndexerConfig) -> Self {
        Self {
            index,
            tokenizer,
            config,
            chunks_since_release: 0,
            releases: 0,
        }
    }

    /// Indexes the pages of one stored batch
    ///
    /// Pages are processed in chunks of `batch-size`; transient structures
    /// are released every `release-every` chunks.
    pub fn index_batch(&mut self, batch_id: BatchId, pages: &[CrawledPage]) -> IndexDelta {
        let mut delta = IndexDelta {
            batch_id,
            ..Default::default()
        };

        if self.index.is_batch_processed(batch_id) {
            debug!("Batch {} already indexed, skipping", batch_id);
            delta.skipped = true;
            return delta;
        }

        let terms_before = self.index.term_count();
        let indexed_at = Utc::now();

        for chunk in pages.chunks(self.config.batch_size.max(1)) {
            for page in chunk {
                let tokens = DocumentTokens::tokenize(
                    self.tokenizer.as_ref(),
                    page.title.as_deref(),
                    page.description.as_deref(),
                    &page.text,
                    &self.config.locale,
                );

                if tokens.is_empty() {
                    debug!("No indexable text on {}", page.url);
                    // A stale earlier version must not keep matching
                    self.index.remove_document(DocId::from_url(&page.url));
                    delta.empty_pages += 1;
                    continue;
                }

                let record = DocumentRecord::from_page(page, indexed_at);
                if self.index.add_document(record, &tokens) {
                    delta.documents_replaced += 1;
                } else {
                    delta.documents_added += 1;
                }
            }

            self.chunks_since_release += 1;
            if self.chunks_since_release >= self.config.release_every.max(1) {
                self.release();
            }
        }

        self.index.mark_batch_processed(batch_id);
        delta.terms_added = self.index.term_count().saturating_sub(terms_before);

        debug!(
            "Indexed batch {}: {} added, {} replaced, {} empty",
            batch_id, delta.documents_added, delta.documents_replaced, delta.empty_pages
        );
        delta
    }

    /// Indexes every batch of a replay that the index has not seen yet
    pub fn run(&mut self, replay: BatchReplay) -> StorageResult<PipelineSummary> {
        let total = replay.len();
        let mut summary = PipelineSummary::default();

        let replay = replay.skip_where(|id| self.index.is_batch_processed(id));
        summary.batches_skipped = total - replay.len();

        info!(
            "Indexing {} batches ({} already indexed)",
            replay.len(),
            summary.batches_skipped
        );

        for batch in replay {
            let batch = batch?;
            let delta = self.index_batch(batch.id, &batch.pages);
            summary.absorb(&delta);
        }
        self.release();

        info!(
            "Indexing done: {} documents, {} terms, ~{} bytes",
            self.index.document_count(),
            self.index.term_count(),
            self.index.estimate_memory_bytes()
        );
        Ok(summary)
    }

    /// Explicitly returns spare capacity to the allocator
    fn release(&mut self) {
        self.index.shrink_to_fit();
        self.chunks_since_release = 0;
        self.releases += 1;
        debug!("Released indexer scratch memory (release #{})", self.releases);
    }

    /// Number of explicit memory releases so far
    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn finish(self) -> InvertedIndex {
        self.index
    }
}
