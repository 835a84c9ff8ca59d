//! Regio-Search: a regional web search back-end
//!
//! This crate implements the crawl → persist → index → rank → cache pipeline of a
//! search engine over a bounded, curated set of domains. Pages are crawled politely
//! with adaptive per-domain rate limiting, flushed to an append-only batch store,
//! indexed into an inverted index with TF-IDF statistics, ranked with a weighted
//! seven-signal function and memoized in a bounded cache.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod engine;
pub mod index;
pub mod output;
pub mod ranking;
pub mod robots;
pub mod state;
pub mod storage;
pub mod text;
pub mod url;

use thiserror::Error;

/// Main error type for Regio-Search operations
#[derive(Debug, Error)]
pub enum RegioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Crawl aborted: {0}")]
    CrawlAborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Regio-Search operations
pub type Result<T> = std::result::Result<T, RegioError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{SearchEngine, SearchHit};
pub use state::{DomainState, SessionState};
pub use url::{extract_domain, normalize_url};
