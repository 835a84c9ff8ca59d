use crate::config::types::{
    CacheConfig, Config, CrawlerConfig, DomainEntry, FetcherConfig, IndexerConfig,
    PolitenessConfig, RankingConfig, RegionalConfig, UserAgentConfig,
};
use crate::url::matches_wildcard;
use crate::ConfigError;
use std::net::SocketAddr;
use url::Url;

/// Slack allowed on the weight sum for floating point error
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Validates the entire configuration
///
/// Runs before any crawling or indexing starts; the first violation is returned.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_politeness_config(&config.politeness)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_indexer_config(&config.indexer)?;
    validate_ranking_config(&config.ranking)?;
    validate_regional_config(&config.regional)?;
    validate_cache_config(&config.cache)?;
    validate_domains(&config.domains)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "crawler batch-size must be >= 1".to_string(),
        ));
    }

    if config.max_pages == 0 || config.max_pages_per_domain == 0 {
        return Err(ConfigError::Validation(
            "max-pages and max-pages-per-domain must be >= 1".to_string(),
        ));
    }

    if config.max_frontier_per_domain == 0 {
        return Err(ConfigError::Validation(
            "max-frontier-per-domain must be >= 1".to_string(),
        ));
    }

    if config.session_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "session-timeout-secs must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.error_rate_threshold) {
        return Err(ConfigError::Validation(format!(
            "error-rate-threshold must be within [0, 1], got {}",
            config.error_rate_threshold
        )));
    }

    Ok(())
}

fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.backoff_factor <= 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be > 1.0, got {}",
            config.backoff_factor
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must be >= base-delay-ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    if !(config.success_decay > 0.0 && config.success_decay <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "success-decay must be within (0, 1], got {}",
            config.success_decay
        )));
    }

    if config.max_consecutive_throttles == 0 {
        return Err(ConfigError::Validation(
            "max-consecutive-throttles must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetcher timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be >= 1".to_string(),
        ));
    }

    for entry in &config.resolve {
        entry.addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid resolve address '{}' for {}: {}",
                entry.addr, entry.host, e
            ))
        })?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_indexer_config(config: &IndexerConfig) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "indexer batch-size must be >= 1".to_string(),
        ));
    }

    if config.release_every == 0 {
        return Err(ConfigError::Validation(
            "release-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_ranking_config(config: &RankingConfig) -> Result<(), ConfigError> {
    let weights = config.weights.as_array();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ConfigError::Validation(format!(
            "ranking weights must be finite and non-negative, got {:?}",
            weights
        )));
    }

    let total = config.weights.total();
    if total > 1.0 + WEIGHT_SUM_EPSILON {
        return Err(ConfigError::Validation(format!(
            "ranking weights must sum to <= 1.0, got {:.4}",
            total
        )));
    }

    if config.diversity_cap == 0 {
        return Err(ConfigError::Validation(
            "diversity-cap must be >= 1".to_string(),
        ));
    }

    if config.recency_half_life_days <= 0.0 {
        return Err(ConfigError::Validation(
            "recency-half-life-days must be > 0".to_string(),
        ));
    }

    if config.density_threshold <= 0.0 || config.stuffing_ceiling < config.density_threshold {
        return Err(ConfigError::Validation(format!(
            "density-threshold ({}) must be > 0 and <= stuffing-ceiling ({})",
            config.density_threshold, config.stuffing_ceiling
        )));
    }

    if !(config.pagerank_damping > 0.0 && config.pagerank_damping < 1.0) {
        return Err(ConfigError::Validation(format!(
            "pagerank-damping must be within (0, 1), got {}",
            config.pagerank_damping
        )));
    }

    if config.pagerank_iterations == 0 {
        return Err(ConfigError::Validation(
            "pagerank-iterations must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_regional_config(config: &RegionalConfig) -> Result<(), ConfigError> {
    for tld in &config.tlds {
        if tld.is_empty() || tld.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "regional tld '{}' must be non-empty and given without a leading dot",
                tld
            )));
        }
    }

    for pattern in &config.trusted_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.max_items == 0 || config.max_bytes == 0 {
        return Err(ConfigError::Validation(
            "cache max-items and max-bytes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the domain catalog entries and their seeds
fn validate_domains(domains: &[DomainEntry]) -> Result<(), ConfigError> {
    for entry in domains {
        validate_domain_pattern(&entry.domain)?;

        if !(0.0..=1.0).contains(&entry.trust) {
            return Err(ConfigError::Validation(format!(
                "trust for '{}' must be within [0, 1], got {}",
                entry.domain, entry.trust
            )));
        }

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' must use HTTP(S)",
                    seed
                )));
            }

            let host = url
                .host_str()
                .map(|h| h.trim_start_matches("www.").to_lowercase())
                .unwrap_or_default();
            if !matches_wildcard(&entry.domain, &host) {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' does not belong to domain '{}'",
                    seed, entry.domain
                )));
            }
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.no')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
