//! Statistics across the store, the index and the caches
//!
//! This module gathers the counters the `stats` command shows and prints
//! them in the same plain console layout as the crawl report.

use crate::cache::CacheStats;
use crate::engine::SearchEngine;
use crate::index::IndexStats;
use crate::storage::{SessionRecord, StoreStats};
use crate::RegioError;

/// Everything the `stats` command reports
#[derive(Debug, Clone)]
pub struct SystemStatistics {
    pub store: StoreStats,
    pub latest_session: Option<SessionRecord>,
    pub index: IndexStats,
    pub results_cache: CacheStats,
    pub query_cache: CacheStats,
}

/// Loads statistics from an open engine
///
/// # Arguments
///
/// * `engine` - The engine whose store, index and caches are inspected
///
/// # Returns
///
/// * `Ok(SystemStatistics)` - Successfully loaded statistics
/// * `Err(RegioError)` - The store could not be queried
pub fn load_statistics(engine: &SearchEngine) -> Result<SystemStatistics, RegioError> {
    let store = engine.store_stats()?;
    let latest_session = engine.store().lock().latest_session()?;

    Ok(SystemStatistics {
        store,
        latest_session,
        index: engine.index_stats(),
        results_cache: engine.cache_stats(),
        query_cache: engine.query_cache_stats(),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SystemStatistics) {
    println!("=== Regio-Search Statistics ===\n");

    println!("Batch Store:");
    println!("  Crawl sessions: {}", stats.store.sessions);
    println!("  Batches: {}", stats.store.batches);
    println!("  Pages: {}", stats.store.pages);
    if let Some(session) = &stats.latest_session {
        println!(
            "  Latest session: #{} {} ({} pages, started {})",
            session.id,
            session.status.to_db_string(),
            session.pages_crawled,
            session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();

    println!("Index:");
    match stats.index.built_at {
        Some(built_at) => {
            println!("  Built: {}", built_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Documents: {}", stats.index.documents);
            println!("  Terms: {}", stats.index.terms);
            println!("  Postings: {}", stats.index.postings);
            println!("  Link edges: {}", stats.index.link_edges);
            println!("  Batches indexed: {}", stats.index.processed_batches);
            println!(
                "  Estimated memory: {}",
                format_bytes(stats.index.estimated_bytes)
            );
        }
        None => println!("  (no index available)"),
    }
    println!();

    print_cache("Result Cache", &stats.results_cache);
    print_cache("Query Cache", &stats.query_cache);
}

fn print_cache(title: &str, stats: &CacheStats) {
    println!("{}:", title);
    println!(
        "  Items: {} ({})",
        stats.items,
        format_bytes(stats.bytes)
    );
    println!(
        "  Hits: {}  Misses: {}  Hit rate: {:.1}%",
        stats.hits,
        stats.misses,
        stats.hit_rate * 100.0
    );
    println!();
}

/// Human-readable byte count (binary units)
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
