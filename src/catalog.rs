//! Domain catalog: which domains may be crawled and how much they are trusted
//!
//! The crawler asks the catalog before following a link and the ranking engine
//! reads the trust score as the domain-authority signal.

use crate::config::DomainEntry;
use crate::url::{matches_wildcard, pattern_specificity};

/// Trust assigned to domains the catalog has no entry for
pub const DEFAULT_TRUST: f64 = 0.5;

/// Source of per-domain crawl permission and trust
pub trait DomainCatalog: Send + Sync {
    /// Static trust score in [0, 1]
    fn trust_score(&self, domain: &str) -> f64;

    /// Whether pages on this domain may be crawled
    fn is_allowed(&self, domain: &str) -> bool;
}

/// Catalog backed by the `[[domains]]` entries of the configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigCatalog {
    entries: Vec<DomainEntry>,
}

impl ConfigCatalog {
    pub fn new(entries: Vec<DomainEntry>) -> Self {
        Self { entries }
    }

    /// Returns the most specific entry matching `domain`
    pub fn entry_for(&self, domain: &str) -> Option<&DomainEntry> {
        let domain = domain.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| matches_wildcard(&entry.domain, &domain))
            .max_by_key(|entry| pattern_specificity(&entry.domain))
    }

    /// Seed URLs of every entry whose pattern matches one of `domains`
    ///
    /// An empty `domains` slice selects every entry.
    pub fn seeds_for(&self, domains: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| {
                domains.is_empty()
                    || domains.iter().any(|d| {
                        let d = d.to_lowercase();
                        matches_wildcard(&entry.domain, &d) || entry.domain == d
                    })
            })
            .flat_map(|entry| entry.seeds.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DomainCatalog for ConfigCatalog {
    fn trust_score(&self, domain: &str) -> f64 {
        self.entry_for(domain)
            .map(|entry| entry.trust)
            .unwrap_or(DEFAULT_TRUST)
    }

    fn is_allowed(&self, domain: &str) -> bool {
        self.entry_for(domain).is_some()
    }
}
