//! Configuration module for Regio-Search
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so a file only needs the domain catalog.
//!
//! # Example
//!
//! ```no_run
//! use regio_search::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("regio.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlerConfig, DomainEntry, EvictionPolicy, FetcherConfig,
    IndexerConfig, PolitenessConfig, RankingConfig, RankingWeights, RegionalConfig, ResolveEntry,
    StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
