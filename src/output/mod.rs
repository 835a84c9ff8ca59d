//! Output module for crawl reports and statistics
//!
//! This module handles:
//! - The report returned by a crawl session
//! - Collecting store, index and cache statistics
//! - Printing reports, statistics and search results to the console

mod report;
pub mod stats;

pub use crate::cache::CacheStats;
pub use crate::index::IndexStats;
pub use report::{print_crawl_report, print_search_results, CrawlReport, DomainSummary};
pub use stats::{format_bytes, load_statistics, print_statistics, SystemStatistics};
