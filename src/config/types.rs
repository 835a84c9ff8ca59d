use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Regio-Search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub regional: RegionalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub domains: Vec<DomainEntry>,
}

/// Crawl session bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum link depth to follow from a seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of crawl workers
    pub workers: usize,

    /// Pages per flushed batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Global page ceiling for one session
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Page ceiling per domain
    #[serde(rename = "max-pages-per-domain")]
    pub max_pages_per_domain: usize,

    /// Frontier capacity per domain; further discoveries are dropped
    #[serde(rename = "max-frontier-per-domain")]
    pub max_frontier_per_domain: usize,

    /// Wall-clock limit for one session (seconds)
    #[serde(rename = "session-timeout-secs")]
    pub session_timeout_secs: u64,

    /// Error ratio above which a domain is moved to the back of the schedule
    #[serde(rename = "error-rate-threshold")]
    pub error_rate_threshold: f64,

    /// Attempts needed before the error ratio is considered
    #[serde(rename = "error-rate-min-attempts")]
    pub error_rate_min_attempts: u32,
}

impl CrawlerConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            workers: 3,
            batch_size: 50,
            max_pages: 50_000,
            max_pages_per_domain: 5_000,
            max_frontier_per_domain: 10_000,
            session_timeout_secs: 3_600,
            error_rate_threshold: 0.5,
            error_rate_min_attempts: 10,
        }
    }
}

/// Per-domain delay and backoff policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolitenessConfig {
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each successful fetch
    pub success_decay: f64,
    /// Throttle signals in a row that suspend a domain for the session
    pub max_consecutive_throttles: u32,
}

impl PolitenessConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            backoff_factor: 1.5,
            max_delay_ms: 5_000,
            success_decay: 0.9,
            max_consecutive_throttles: 3,
        }
    }
}

/// HTTP fetch limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub respect_robots: bool,
    /// Static host → socket address overrides, applied before DNS
    pub resolve: Vec<ResolveEntry>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            max_body_bytes: 5 * 1024 * 1024,
            respect_robots: true,
            resolve: Vec::new(),
        }
    }
}

/// A single DNS override
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveEntry {
    pub host: String,
    pub addr: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "RegioBot".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://regio-search.invalid/bot".to_string(),
            contact_email: "bot@regio-search.invalid".to_string(),
        }
    }
}

/// Locations of persisted state
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// SQLite file holding the page batches
    pub database_path: String,

    /// Index artifact (replaced atomically on every build)
    pub index_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./regio-pages.db".to_string(),
            index_path: "./regio-index.bin".to_string(),
        }
    }
}

/// Indexer pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexerConfig {
    /// Pages handed to `index_batch` per call
    pub batch_size: usize,

    /// Release transient buffers every this many batches
    pub release_every: usize,

    /// Locale passed to the tokenizer
    pub locale: String,

    /// Strip inflectional endings from indexed and query terms
    pub stemming: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            release_every: 5,
            locale: "nb".to_string(),
            stemming: false,
        }
    }
}

/// Weights of the seven ranking signals
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RankingWeights {
    pub tf_idf: f64,
    pub pagerank: f64,
    pub domain_authority: f64,
    pub recency: f64,
    pub keyword_density: f64,
    pub link_structure: f64,
    pub regional_relevance: f64,
}

impl RankingWeights {
    pub fn total(&self) -> f64 {
        self.tf_idf
            + self.pagerank
            + self.domain_authority
            + self.recency
            + self.keyword_density
            + self.link_structure
            + self.regional_relevance
    }

    pub fn as_array(&self) -> [f64; 7] {
        [
            self.tf_idf,
            self.pagerank,
            self.domain_authority,
            self.recency,
            self.keyword_density,
            self.link_structure,
            self.regional_relevance,
        ]
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            tf_idf: 0.35,
            pagerank: 0.20,
            domain_authority: 0.15,
            recency: 0.10,
            keyword_density: 0.08,
            link_structure: 0.07,
            regional_relevance: 0.05,
        }
    }
}

/// Ranking engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RankingConfig {
    pub weights: RankingWeights,
    /// Maximum results per domain when diversification is on
    pub diversity_cap: usize,
    pub recency_half_life_days: f64,
    /// Keyword density that earns the full density score
    pub density_threshold: f64,
    /// Density beyond which the score is penalized as stuffing
    pub stuffing_ceiling: f64,
    pub pagerank_damping: f64,
    pub pagerank_iterations: usize,
    pub pagerank_tolerance: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            diversity_cap: 3,
            recency_half_life_days: 30.0,
            density_threshold: 0.05,
            stuffing_ceiling: 0.25,
            pagerank_damping: 0.85,
            pagerank_iterations: 50,
            pagerank_tolerance: 1e-6,
        }
    }
}

/// Table-driven regional affinity
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegionalConfig {
    /// Top-level domains that count as regional (without the dot, e.g. "no")
    pub tlds: Vec<String>,

    /// Domain patterns that always count as regional
    pub trusted_domains: Vec<String>,

    /// Locale keywords whose presence in a document earns a boost
    pub keywords: Vec<String>,
}

/// Eviction policy of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Lfu,
    Ttl,
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    pub policy: EvictionPolicy,
    pub max_items: usize,
    pub max_bytes: usize,
    /// Default time-to-live; zero disables expiry
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: EvictionPolicy::Lru,
            max_items: 1_000,
            max_bytes: 16 * 1024 * 1024,
            ttl_secs: 300,
        }
    }
}

/// An allowed domain with its trust score and seed URLs
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.no" or "*.example.no")
    pub domain: String,

    /// Static trust score in [0, 1]
    #[serde(default = "default_trust")]
    pub trust: f64,

    /// URLs to start crawling from
    #[serde(default)]
    pub seeds: Vec<String>,
}

fn default_trust() -> f64 {
    0.5
}
