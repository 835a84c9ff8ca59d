//! Ranking module: seven weighted signals and per-domain diversity
//!
//! Query-time scoring reads a frozen [`IndexSnapshot`]; PageRank and the
//! domain link counts are computed when the snapshot is built. For a given
//! snapshot, weights, query and evaluation time, ranking is a pure function.

mod diversity;
mod pagerank;
mod signals;

pub use diversity::cap_per_domain;
pub use pagerank::LinkGraph;
pub use signals::{
    keyword_density, link_structure, recency, tf_idf_cosine, QueryVector, RankSignals,
    RegionalProfile,
};

use crate::catalog::DomainCatalog;
use crate::config::{RankingConfig, RegionalConfig};
use crate::index::{DocId, DocumentRecord, IndexSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::trace;

/// A scored document
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDoc {
    pub doc_id: DocId,
    pub score: f64,
    pub signals: RankSignals,
}

/// Scores candidate documents against a query
pub struct RankingEngine {
    config: RankingConfig,
    regional: RegionalProfile,
    catalog: Arc<dyn DomainCatalog>,
}

impl RankingEngine {
    pub fn new(config: RankingConfig, regional: &RegionalConfig, catalog: Arc<dyn DomainCatalog>) -> Self {
        Self {
            config,
            regional: RegionalProfile::new(regional),
            catalog,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Ranks candidates best first, evaluated at the current time
    pub fn rank(&self, snapshot: &IndexSnapshot, query_terms: &[String], candidates: &[DocId]) -> Vec<RankedDoc> {
        self.rank_at(snapshot, query_terms, candidates, Utc::now())
    }

    /// Ranks candidates best first with recency measured at `now`
    ///
    /// Ties are broken by ascending document id. Candidates missing from the
    /// snapshot are ignored.
    pub fn rank_at(
        &self,
        snapshot: &IndexSnapshot,
        query_terms: &[String],
        candidates: &[DocId],
        now: DateTime<Utc>,
    ) -> Vec<RankedDoc> {
        let query = QueryVector::new(&snapshot.index, query_terms);

        let mut ranked: Vec<RankedDoc> = candidates
            .iter()
            .filter_map(|id| snapshot.index.document(*id))
            .map(|record| {
                let signals = self.signals(snapshot, record, &query, now);
                let score = signals.combine(&self.config.weights);
                trace!("{} scored {:.4} ({:?})", record.url, score, signals);
                RankedDoc {
                    doc_id: record.id,
                    score,
                    signals,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        ranked.dedup_by_key(|r| r.doc_id);
        ranked
    }

    /// Computes all seven signals for one document
    pub fn signals(
        &self,
        snapshot: &IndexSnapshot,
        record: &DocumentRecord,
        query: &QueryVector,
        now: DateTime<Utc>,
    ) -> RankSignals {
        let index = &snapshot.index;
        let occurrences: u32 = query
            .terms()
            .filter_map(|term| index.lookup(term)?.get(record.id))
            .map(|posting| posting.tf())
            .sum();

        RankSignals {
            tf_idf: tf_idf_cosine(index, record, query),
            pagerank: snapshot.pagerank_of(record.id),
            domain_authority: self.catalog.trust_score(&record.domain).clamp(0.0, 1.0),
            recency: recency(record.indexed_at, now, self.config.recency_half_life_days),
            keyword_density: keyword_density(
                occurrences,
                record.length,
                self.config.density_threshold,
                self.config.stuffing_ceiling,
            ),
            link_structure: link_structure(snapshot.links_of(&record.domain)),
            regional_relevance: self.regional.score(record),
        }
    }

    /// Drops results beyond the per-domain cap
    pub fn diversify(&self, snapshot: &IndexSnapshot, ranked: Vec<RankedDoc>) -> Vec<RankedDoc> {
        cap_per_domain(ranked, self.config.diversity_cap, |r| {
            snapshot
                .index
                .document(r.doc_id)
                .map_or("", |d| d.domain.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ConfigCatalog;
    use crate::config::{DomainEntry, RankingWeights};
    use crate::index::{DocumentTokens, InvertedIndex};
    use crate::storage::test_support::page;
    use crate::text::UnicodeTokenizer;

    fn snapshot(pages: &[(&str, &str, &str)]) -> IndexSnapshot {
        let mut index = InvertedIndex::new();
        for (url, title, text) in pages {
            let page = page(url, title, text, &[]);
            let tokens = DocumentTokens::tokenize(
                &UnicodeTokenizer,
                page.title.as_deref(),
                None,
                &page.text,
                "nb",
            );
            index.add_document(crate::index::DocumentRecord::from_page(&page, Utc::now()), &tokens);
        }
        IndexSnapshot::build(index, &RankingConfig::default(), Utc::now())
    }

    fn engine(config: RankingConfig) -> RankingEngine {
        let catalog = ConfigCatalog::new(vec![DomainEntry {
            domain: "a.test".to_string(),
            trust: 0.9,
            seeds: vec![],
        }]);
        RankingEngine::new(config, &RegionalConfig::default(), Arc::new(catalog))
    }

    fn query(terms: &[&str]) -> Vec<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_title_match_ranks_first() {
        let snap = snapshot(&[
            ("https://a.test/1", "Forskning", "om forskning ved instituttet"),
            ("https://a.test/2", "Nyheter", "nyheter sport kultur og litt forskning i dag"),
            ("https://a.test/3", "Sport", "fotball"),
        ]);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);

        let ranked = engine.rank(&snap, &terms, &candidates);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].doc_id, DocId::from_url("https://a.test/1"));
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let snap = snapshot(&[
            ("https://a.test/1", "", "forskning alfa"),
            ("https://a.test/2", "", "forskning beta"),
            ("https://b.test/1", "", "forskning gamma"),
        ]);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);
        let now = Utc::now();

        let first = engine.rank_at(&snap, &terms, &candidates, now);
        let second = engine.rank_at(&snap, &terms, &candidates, now);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_ties_break_on_doc_id() {
        let snap = snapshot(&[
            ("https://b.test/1", "", "forskning"),
            ("https://b.test/2", "", "forskning"),
        ]);
        let mut config = RankingConfig::default();
        config.weights = RankingWeights {
            tf_idf: 0.0,
            pagerank: 0.0,
            domain_authority: 1.0,
            recency: 0.0,
            keyword_density: 0.0,
            link_structure: 0.0,
            regional_relevance: 0.0,
        };
        let engine = engine(config);
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);

        let ranked = engine.rank(&snap, &terms, &candidates);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert!(ranked[0].doc_id < ranked[1].doc_id);
    }

    #[test]
    fn test_domain_authority_from_catalog() {
        let snap = snapshot(&[
            ("https://a.test/1", "", "forskning"),
            ("https://b.test/1", "", "forskning"),
        ]);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);

        let ranked = engine.rank(&snap, &terms, &candidates);
        assert_eq!(ranked[0].doc_id, DocId::from_url("https://a.test/1"));
        assert_eq!(ranked[0].signals.domain_authority, 0.9);
        assert_eq!(ranked[1].signals.domain_authority, 0.5);
    }

    #[test]
    fn test_signals_stay_in_unit_range() {
        let snap = snapshot(&[
            ("https://a.test/1", "Forskning", "forskning forskning forskning"),
            ("https://b.test/1", "", "forskning og nyheter"),
        ]);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning", "nyheter"]);
        let candidates = snap.index.candidates(&terms);

        for ranked in engine.rank(&snap, &terms, &candidates) {
            assert!(ranked.signals.as_array().iter().all(|s| (0.0..=1.0).contains(s)));
            assert!(ranked.score <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_diversify_caps_domains() {
        let pages: Vec<(String, String, String)> = (0..5)
            .map(|i| (format!("https://a.test/{}", i), String::new(), "forskning".to_string()))
            .chain(std::iter::once((
                "https://b.test/0".to_string(),
                String::new(),
                "forskning".to_string(),
            )))
            .collect();
        let refs: Vec<(&str, &str, &str)> = pages
            .iter()
            .map(|(u, t, b)| (u.as_str(), t.as_str(), b.as_str()))
            .collect();
        let snap = snapshot(&refs);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);

        let ranked = engine.rank(&snap, &terms, &candidates);
        assert_eq!(ranked.len(), 6);
        let capped = engine.diversify(&snap, ranked);
        assert_eq!(capped.len(), 4);
        let from_a = capped
            .iter()
            .filter(|r| snap.index.document(r.doc_id).unwrap().domain == "a.test")
            .count();
        assert_eq!(from_a, 3);
    }

    #[test]
    fn test_recency_follows_last_indexing() {
        let now = Utc::now();
        let mut page = page("https://a.test/1", "Forskning", "forskning", &[]);
        page.fetched_at = now - chrono::Duration::days(365);
        let tokens = DocumentTokens::tokenize(&UnicodeTokenizer, page.title.as_deref(), None, &page.text, "nb");
        let mut index = InvertedIndex::new();
        index.add_document(
            crate::index::DocumentRecord::from_page(&page, now - chrono::Duration::days(30)),
            &tokens,
        );
        let snap = IndexSnapshot::build(index, &RankingConfig::default(), now);
        let engine = engine(RankingConfig::default());
        let terms = query(&["forskning"]);
        let candidates = snap.index.candidates(&terms);

        let ranked = engine.rank_at(&snap, &terms, &candidates, now);
        assert!((ranked[0].signals.recency - 0.5).abs() < 1e-6);
    }
}
