//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Adaptive per-domain rate limiting
//! - Polite HTTP fetching with robots.txt support
//! - HTML extraction of text, metadata and links
//! - The per-domain frontier and its round-robin scheduling
//! - Overall crawl coordination and batch flushing

mod buffer;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod rate_limiter;

pub use buffer::PageBuffer;
pub use coordinator::{Coordinator, CrawlOptions, StopSignal};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use frontier::{AttemptOutcome, DomainProgress, DomainStatus, Frontier, FrontierEntry, NextEntry};
pub use parser::{ExtractedPage, HtmlExtractor, ParseError, ScraperExtractor};
pub use rate_limiter::RateLimiter;
