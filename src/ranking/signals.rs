//! The seven per-document ranking signals
//!
//! Every signal is a pure function of the snapshot, the query and, for
//! recency, the evaluation time. All of them return values in [0, 1].

use crate::config::{RankingWeights, RegionalConfig};
use crate::index::{DocumentRecord, DomainLinks, InvertedIndex};
use crate::text::normalize_word;
use crate::url::{matches_wildcard, top_level_domain};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Signal values for one (query, document) pair; never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankSignals {
    pub tf_idf: f64,
    pub pagerank: f64,
    pub domain_authority: f64,
    pub recency: f64,
    pub keyword_density: f64,
    pub link_structure: f64,
    pub regional_relevance: f64,
}

impl RankSignals {
    /// Same order as [`RankingWeights::as_array`]
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.tf_idf,
            self.pagerank,
            self.domain_authority,
            self.recency,
            self.keyword_density,
            self.link_structure,
            self.regional_relevance,
        ]
    }

    /// Weighted sum of all signals
    pub fn combine(&self, weights: &RankingWeights) -> f64 {
        self.as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(signal, weight)| signal * weight)
            .sum()
    }
}

/// Query terms with their TF-IDF weights
#[derive(Debug, Clone, Default)]
pub struct QueryVector {
    weights: BTreeMap<String, f64>,
    norm: f64,
}

impl QueryVector {
    /// Weights repeated terms sublinearly, like document terms
    pub fn new(index: &InvertedIndex, terms: &[String]) -> Self {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for term in terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }

        let weights: BTreeMap<String, f64> = counts
            .into_iter()
            .map(|(term, count)| {
                let w = (1.0 + f64::from(count).ln()) * index.idf(term);
                (term.to_string(), w)
            })
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();

        Self { weights, norm }
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }
}

/// Cosine similarity between the query and the document's TF-IDF vector
pub fn tf_idf_cosine(index: &InvertedIndex, record: &DocumentRecord, query: &QueryVector) -> f64 {
    if query.norm == 0.0 || record.vector_norm == 0.0 {
        return 0.0;
    }

    let dot: f64 = query
        .weights
        .iter()
        .filter_map(|(term, qw)| {
            let posting = index.lookup(term)?.get(record.id)?;
            Some(qw * posting.term_weight() * index.idf(term))
        })
        .sum();

    (dot / (query.norm * record.vector_norm)).clamp(0.0, 1.0)
}

/// Exponential decay with the given half-life
///
/// Timestamps in the future count as age zero, so the signal stays in
/// (0, 1] and only ever decreases with age.
pub fn recency(indexed_at: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_secs = (now - indexed_at).num_seconds().max(0) as f64;
    let age_days = age_secs / 86_400.0;
    0.5_f64.powf(age_days / half_life_days)
}

/// Query-term density with a plateau and a stuffing penalty
///
/// Rises linearly up to `threshold`, stays at 1.0 up to `ceiling` and falls
/// off as `ceiling / density` beyond it.
pub fn keyword_density(occurrences: u32, length: u32, threshold: f64, ceiling: f64) -> f64 {
    if length == 0 || occurrences == 0 {
        return 0.0;
    }
    let density = f64::from(occurrences) / f64::from(length);
    if density <= threshold {
        density / threshold
    } else if density <= ceiling {
        1.0
    } else {
        ceiling / density
    }
}

/// Share of a domain's cross-domain links that point to it
///
/// 0.5 when the domain has no cross-domain links at all.
pub fn link_structure(links: DomainLinks) -> f64 {
    let total = links.inbound + links.outbound;
    if total == 0 {
        return 0.5;
    }
    f64::from(links.inbound) / f64::from(total)
}

/// Points for a regional top-level domain
const TLD_BOOST: f64 = 0.4;
/// Points for a trusted regional domain
const TRUSTED_BOOST: f64 = 0.3;
/// Points for locale keyword hits, reached at `KEYWORD_SATURATION` hits
const KEYWORD_BOOST: f64 = 0.3;
const KEYWORD_SATURATION: usize = 3;

/// Table-driven regional affinity
#[derive(Debug, Clone, Default)]
pub struct RegionalProfile {
    tlds: Vec<String>,
    trusted_domains: Vec<String>,
    keywords: Vec<String>,
}

impl RegionalProfile {
    pub fn new(config: &RegionalConfig) -> Self {
        let mut keywords: Vec<String> = config
            .keywords
            .iter()
            .map(|k| normalize_word(k))
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();

        Self {
            tlds: config.tlds.iter().map(|t| t.to_lowercase()).collect(),
            trusted_domains: config
                .trusted_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            keywords,
        }
    }

    /// Regional relevance of a document
    pub fn score(&self, record: &DocumentRecord) -> f64 {
        let mut score = 0.0;

        let regional_tld = top_level_domain(&record.domain)
            .is_some_and(|tld| self.tlds.iter().any(|t| t == tld));
        if regional_tld {
            score += TLD_BOOST;
        }

        if self
            .trusted_domains
            .iter()
            .any(|pattern| matches_wildcard(pattern, &record.domain))
        {
            score += TRUSTED_BOOST;
        }

        if !self.keywords.is_empty() {
            let hits = self
                .keywords
                .iter()
                .filter(|k| record.terms.binary_search(k).is_ok())
                .count();
            score += KEYWORD_BOOST * hits.min(KEYWORD_SATURATION) as f64 / KEYWORD_SATURATION as f64;
        }

        score.min(1.0)
    }
}
