//! Report types produced by crawl sessions

use crate::engine::SearchHit;
use crate::state::SessionState;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-domain outcome of a crawl session
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSummary {
    pub domain: String,
    /// "active", "page_limit" or "suspended"
    pub status: String,
    pub pages_crawled: usize,
    pub attempts: u32,
    pub errors: u32,
    /// URLs refused because the domain queue was full
    pub dropped: usize,
    /// URLs still queued when the session ended
    pub queued: usize,
}

/// Summary of one crawl session
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub session_id: i64,
    pub final_state: SessionState,
    /// Pages extracted and handed to the store
    pub pages_crawled: usize,
    /// Documents in the index after the post-crawl update (0 if not indexed)
    pub pages_indexed: usize,
    /// Failed attempts of any kind
    pub errors: usize,
    /// Failed attempts by error kind
    pub errors_by_kind: BTreeMap<String, usize>,
    pub batches_flushed: usize,
    /// Largest number of unflushed pages held in memory at once
    pub peak_buffered: usize,
    pub suspended_domains: Vec<String>,
    /// Whether the session ended on the stop signal or the session timeout
    pub interrupted: bool,
    pub domains: Vec<DomainSummary>,
    pub duration: Duration,
}

impl CrawlReport {
    /// Errors recorded for one kind (e.g. "timeout")
    pub fn errors_of(&self, kind: &str) -> usize {
        self.errors_by_kind.get(kind).copied().unwrap_or(0)
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainSummary> {
        self.domains.iter().find(|d| d.domain == domain)
    }
}

/// Prints a crawl report to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    println!("=== Crawl Session #{} ===\n", report.session_id);

    println!("Overview:");
    println!("  Final state: {}", report.final_state.to_db_string());
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    println!("  Pages crawled: {}", report.pages_crawled);
    println!("  Documents indexed: {}", report.pages_indexed);
    println!("  Batches flushed: {}", report.batches_flushed);
    println!("  Peak buffered pages: {}", report.peak_buffered);
    if report.interrupted {
        println!("  Interrupted before the frontier was exhausted");
    }
    println!();

    if report.errors > 0 {
        println!("Errors ({}):", report.errors);
        for (kind, count) in &report.errors_by_kind {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !report.suspended_domains.is_empty() {
        println!("Suspended Domains ({}):", report.suspended_domains.len());
        for domain in &report.suspended_domains {
            println!("  - {}", domain);
        }
        println!();
    }

    println!("Domains:");
    for d in &report.domains {
        println!(
            "  {} [{}]: {} pages, {} attempts, {} errors, {} queued, {} dropped",
            d.domain, d.status, d.pages_crawled, d.attempts, d.errors, d.queued, d.dropped
        );
    }
}

/// Prints ranked search hits to stdout
pub fn print_search_results(query: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results for \"{}\"", query);
        return;
    }

    println!("Results for \"{}\":\n", query);
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2}. {} ({:.4})", rank + 1, hit.title, hit.score);
        println!("    {}", hit.url);
        if !hit.snippet.is_empty() {
            println!("    {}", hit.snippet);
        }
        println!();
    }
}
