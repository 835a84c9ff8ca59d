//! Cache module for query results and normalized queries
//!
//! [`CacheManager`] is a bounded, thread-safe map with LRU, LFU or TTL
//! eviction. The search facade keeps two of them: one for ranked result
//! pages and one for the tokenized form of query strings.

mod manager;

pub use manager::{CacheManager, CacheStats, Weigh};

/// Cache key of a result page
///
/// Every parameter that changes the result is part of the key, so two
/// different requests can never share an entry. The unit separator cannot
/// occur in the numeric fields, and the query text comes last.
pub fn search_key(query: &str, max_results: usize, diversify: bool) -> String {
    format!("{}\u{1f}{}\u{1f}{}", max_results, u8::from(diversify), query.trim())
}
