//! Immutable index snapshots and the handle queries read them through

use super::{DocId, IndexError, IndexResult, IndexStats, InvertedIndex};
use crate::config::RankingConfig;
use crate::ranking::LinkGraph;
use crate::url::extract_domain;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Cross-domain link counts of one domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainLinks {
    /// Links from other domains' pages to this domain
    pub inbound: u32,
    /// Links from this domain's pages to other domains
    pub outbound: u32,
}

/// A finished index together with the offline link scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub index: InvertedIndex,
    /// PageRank per document, normalized to [0, 1]
    pub pagerank: BTreeMap<DocId, f64>,
    pub domain_links: BTreeMap<String, DomainLinks>,
    pub link_edges: usize,
    pub built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Freezes an index: computes vector norms, PageRank and link counts
    pub fn build(mut index: InvertedIndex, ranking: &RankingConfig, built_at: DateTime<Utc>) -> Self {
        index.finalize();

        let graph = LinkGraph::from_index(&index);
        let pagerank = graph.pagerank(
            ranking.pagerank_damping,
            ranking.pagerank_iterations,
            ranking.pagerank_tolerance,
        );
        let domain_links = domain_link_counts(&index);

        info!(
            "Built index snapshot: {} documents, {} terms, {} link edges",
            index.document_count(),
            index.term_count(),
            graph.edge_count()
        );

        Self {
            index,
            pagerank,
            domain_links,
            link_edges: graph.edge_count(),
            built_at,
        }
    }

    pub fn pagerank_of(&self, id: DocId) -> f64 {
        self.pagerank.get(&id).copied().unwrap_or(0.0)
    }

    pub fn links_of(&self, domain: &str) -> DomainLinks {
        self.domain_links.get(domain).copied().unwrap_or_default()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.index.document_count(),
            terms: self.index.term_count(),
            postings: self.index.posting_count(),
            estimated_bytes: self.index.estimate_memory_bytes(),
            processed_batches: self.index.processed_batches().len(),
            link_edges: self.link_edges,
            built_at: Some(self.built_at),
        }
    }

    /// Full consistency check run before a loaded snapshot is served
    pub fn verify(&self) -> IndexResult<()> {
        self.index.verify_consistency()?;

        for (id, score) in &self.pagerank {
            if !self.index.contains_document(*id) {
                return Err(IndexError::Corrupt(format!(
                    "PageRank entry for unknown document {}",
                    id
                )));
            }
            if !score.is_finite() || !(0.0..=1.0).contains(score) {
                return Err(IndexError::Corrupt(format!(
                    "PageRank of {} out of range: {}",
                    id, score
                )));
            }
        }

        for record in self.index.documents() {
            if !record.vector_norm.is_finite() || record.vector_norm < 0.0 {
                return Err(IndexError::Corrupt(format!(
                    "document {} has invalid vector norm {}",
                    record.id, record.vector_norm
                )));
            }
        }

        Ok(())
    }
}

/// Counts links that cross a domain boundary, per domain
///
/// Every outbound link counts, including links to pages that were never
/// crawled, since they still describe how the domain relates to others.
fn domain_link_counts(index: &InvertedIndex) -> BTreeMap<String, DomainLinks> {
    let mut counts: BTreeMap<String, DomainLinks> = BTreeMap::new();
    for record in index.documents() {
        for link in &record.outbound_links {
            let Some(target) = ::url::Url::parse(link).ok().and_then(|u| extract_domain(&u)) else {
                continue;
            };
            if target == record.domain {
                continue;
            }
            counts.entry(record.domain.clone()).or_default().outbound += 1;
            counts.entry(target).or_default().inbound += 1;
        }
    }
    counts
}

/// Publication point for the snapshot queries are served from
///
/// Snapshots are replaced wholesale; a reader holding an `Arc` keeps a
/// consistent view even while a newer snapshot is swapped in.
#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot currently served, if any
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().clone()
    }

    /// Publishes a snapshot and returns the one it replaced
    pub fn swap(&self, snapshot: Arc<IndexSnapshot>) -> Option<Arc<IndexSnapshot>> {
        self.current.write().replace(snapshot)
    }

    /// Stops serving; later queries see no index
    pub fn clear(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.write().take()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }
}
