//! URL handling module for Regio-Search
//!
//! This module provides URL normalization (the frontier deduplication key),
//! domain extraction and wildcard matching for catalog patterns.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, top_level_domain};
pub use matcher::{matches_wildcard, pattern_specificity};
pub use normalize::normalize_url;
