//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler's user agent and timeouts
//! - Waiting out the per-domain politeness delay before every request
//! - Fetching and installing robots.txt rules
//! - Enforcing the response size ceiling while streaming the body
//! - Classifying failures into [`FetchError`]

use crate::config::{Config, FetcherConfig, UserAgentConfig};
use crate::crawler::rate_limiter::RateLimiter;
use crate::robots::RobotsPolicy;
use crate::url::extract_domain;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for one request
const MAX_REDIRECTS: usize = 5;

/// Robots.txt bytes read per domain; later content is ignored
const ROBOTS_MAX_BYTES: usize = 512 * 1024;

/// Content types accepted as HTML
const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Why a fetch produced no page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    /// HTTP 429 or 503; the domain's delay has already been grown
    #[error("throttled by server (retry after {0:?})")]
    Throttled(Option<Duration>),

    #[error("HTTP error status {0}")]
    HttpError(u16),

    #[error("unsupported content type '{0}'")]
    InvalidContentType(String),

    #[error("response body exceeds {0} bytes")]
    TooLarge(usize),

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Whether the same URL may succeed if tried again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout
                | FetchError::ConnectionRefused
                | FetchError::Throttled(_)
                | FetchError::Transport(_)
        )
    }

    /// Short stable label used in crawl reports
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::ConnectionRefused => "connection_refused",
            FetchError::Throttled(_) => "throttled",
            FetchError::HttpError(_) => "http_error",
            FetchError::InvalidContentType(_) => "invalid_content_type",
            FetchError::TooLarge(_) => "too_large",
            FetchError::RobotsDisallowed => "robots_disallowed",
            FetchError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() {
            FetchError::ConnectionRefused
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

/// A successfully fetched HTML response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: Url,
    /// URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `fetcher` - Timeouts and host resolution overrides
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetcher: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(fetcher.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    for entry in &fetcher.resolve {
        match entry.addr.parse::<SocketAddr>() {
            Ok(addr) => builder = builder.resolve(&entry.host, addr),
            Err(e) => tracing::warn!("Ignoring resolve override for {}: {}", entry.host, e),
        }
    }

    builder.build()
}

/// Polite HTTP fetcher shared by all crawl workers
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    robots: Arc<dyn RobotsPolicy>,
    max_body_bytes: usize,
    respect_robots: bool,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Full configuration (user agent and fetcher sections are used)
    /// * `limiter` - Rate limiter shared with the coordinator
    /// * `robots` - Robots policy consulted before every page request
    pub fn new(
        config: &Config,
        limiter: Arc<RateLimiter>,
        robots: Arc<dyn RobotsPolicy>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&config.user_agent, &config.fetcher)?,
            limiter,
            robots,
            max_body_bytes: config.fetcher.max_body_bytes,
            respect_robots: config.fetcher.respect_robots,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches one URL
    ///
    /// # Request Flow
    ///
    /// 1. Fetch robots.txt for the domain if the policy has no fresh rules
    /// 2. Refuse paths the rules disallow
    /// 3. Wait out the domain's current delay, then send the GET
    /// 4. Map throttling statuses to [`FetchError::Throttled`] and grow the delay
    /// 5. Check the content type, then stream the body up to the size ceiling
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 429 / 503 | `Throttled`, delay grows |
    /// | Other non-2xx | `HttpError(status)` |
    /// | Not HTML | `InvalidContentType` |
    /// | Body over ceiling | `TooLarge` |
    /// | Timeout | `Timeout` |
    /// | Connect failure | `ConnectionRefused` |
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let domain = extract_domain(url)
            .ok_or_else(|| FetchError::Transport(format!("no host in {}", url)))?;

        if self.respect_robots {
            if self.robots.needs_rules(&domain) {
                self.fetch_robots(url, &domain).await?;
            }
            if !self.robots.is_path_allowed(&domain, url.path()) {
                return Err(FetchError::RobotsDisallowed);
            }
        }

        self.wait_for_slot(&domain).await;
        let mut response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if is_throttle_status(status) {
            let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
            self.limiter.record_throttled(&domain);
            return Err(FetchError::Throttled(retry_after));
        }

        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_html(&content_type) {
            return Err(FetchError::InvalidContentType(content_type));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(FetchError::TooLarge(self.max_body_bytes));
            }
        }

        let final_url = response.url().clone();
        let (body, truncated) = read_capped(&mut response, self.max_body_bytes).await?;
        if truncated {
            return Err(FetchError::TooLarge(self.max_body_bytes));
        }

        self.limiter.record_success(&domain);

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }

    /// Downloads robots.txt for the domain of `url` and installs the rules
    ///
    /// A missing file (4xx) or a server error installs empty rules, which allow
    /// everything. A throttling response installs nothing so the next request
    /// tries again.
    async fn fetch_robots(&self, url: &Url, domain: &str) -> Result<(), FetchError> {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        self.wait_for_slot(domain).await;
        let content = match self.client.get(robots_url.clone()).send().await {
            Ok(response) if is_throttle_status(response.status()) => {
                let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
                self.limiter.record_throttled(domain);
                return Err(FetchError::Throttled(retry_after));
            }
            Ok(mut response) if response.status().is_success() => {
                let limit = self.max_body_bytes.min(ROBOTS_MAX_BYTES);
                match read_capped(&mut response, limit).await {
                    Ok((bytes, truncated)) => {
                        if truncated {
                            tracing::debug!("{} exceeds {} bytes, rest ignored", robots_url, limit);
                        }
                        String::from_utf8_lossy(&bytes).into_owned()
                    }
                    Err(e) => {
                        tracing::debug!("Failed to read {}: {}", robots_url, e);
                        String::new()
                    }
                }
            }
            Ok(response) => {
                tracing::debug!("No robots.txt at {} ({})", robots_url, response.status());
                String::new()
            }
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", robots_url, e);
                String::new()
            }
        };

        self.robots.install_rules(domain, &content);
        if let Some(delay) = self.robots.crawl_delay(domain) {
            tracing::info!("{} declares Crawl-delay {:?}", domain, delay);
            self.limiter.apply_crawl_delay(domain, delay);
        }
        Ok(())
    }

    /// Sleeps until the domain's delay has passed since its last request
    ///
    /// The delay is the spacing between two requests to one domain, so time
    /// already spent since the previous request counts toward it. A domain
    /// that was never requested is not delayed.
    async fn wait_for_slot(&self, domain: &str) {
        let wait = self.limiter.remaining_wait(domain, Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.limiter.record_request(domain);
    }
}

/// Reads at most `limit` body bytes, stopping at the first chunk past it
///
/// Returns the bytes read and whether the body was longer than `limit`.
async fn read_capped(
    response: &mut reqwest::Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), FetchError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

fn is_throttle_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    HTML_CONTENT_TYPES.contains(&mime.as_str())
}

/// Parses a `Retry-After` header given in seconds
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolitenessConfig;
    use crate::robots::{AllowAllRobots, RobotsCache};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(max_body_bytes: usize) -> Config {
        let mut config = Config::default();
        config.politeness = PolitenessConfig {
            base_delay_ms: 10,
            backoff_factor: 1.5,
            max_delay_ms: 100,
            success_decay: 0.9,
            max_consecutive_throttles: 3,
        };
        config.fetcher.timeout_secs = 2;
        config.fetcher.max_body_bytes = max_body_bytes;
        config
    }

    fn fetcher(config: &Config, robots: Arc<dyn RobotsPolicy>) -> Fetcher {
        let limiter = Arc::new(RateLimiter::new(config.politeness.clone()));
        Fetcher::new(config, limiter, robots).unwrap()
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    #[test]
    fn test_build_http_client() {
        let config = Config::default();
        assert!(build_http_client(&config.user_agent, &config.fetcher).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/pdf"));
        assert!(!is_html(""));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Throttled(None).is_retryable());
        assert!(!FetchError::HttpError(404).is_retryable());
        assert!(!FetchError::TooLarge(10).is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html("<html><title>Hei</title></html>"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.status_code, 200);
        assert!(String::from_utf8_lossy(&page.body).contains("Hei"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF".to_vec(), "application/pdf"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        assert!(matches!(
            fetcher.fetch(&url).await,
            Err(FetchError::InvalidContentType(ct)) if ct == "application/pdf"
        ));
    }

    #[tokio::test]
    async fn test_fetch_enforces_size_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html(&"x".repeat(4096)))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        assert_eq!(fetcher.fetch(&url).await.unwrap_err(), FetchError::TooLarge(1024));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();

        assert_eq!(fetcher.fetch(&url).await.unwrap_err(), FetchError::HttpError(404));
    }

    #[tokio::test]
    async fn test_throttle_grows_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();
        let domain = extract_domain(&url).unwrap();
        let before = fetcher.limiter().delay_for(&domain);

        assert_eq!(
            fetcher.fetch(&url).await.unwrap_err(),
            FetchError::Throttled(Some(Duration::from_secs(7)))
        );
        assert!(fetcher.limiter().delay_for(&domain) > before);
    }

    #[tokio::test]
    async fn test_robots_disallow_and_crawl_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"User-agent: *\nDisallow: /private\nCrawl-delay: 0.05".to_vec(), "text/plain"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(html("<p>ok</p>"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let robots = Arc::new(RobotsCache::new("RegioBot"));
        let fetcher = fetcher(&config, robots.clone());

        let private = Url::parse(&format!("{}/private/page", server.uri())).unwrap();
        assert_eq!(
            fetcher.fetch(&private).await.unwrap_err(),
            FetchError::RobotsDisallowed
        );

        // The rule past the ceiling was never read
        let open = Url::parse(&format!("{}/open", server.uri())).unwrap();
        assert!(fetcher.fetch(&open).await.is_ok());

        let domain = extract_domain(&open).unwrap();
        assert_eq!(
            fetcher.limiter().snapshot(&domain).unwrap().floor_delay,
            Duration::from_millis(50)
        );
        assert_eq!(robots.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(html("<p>ok</p>"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(RobotsCache::new("RegioBot")));
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();

        assert!(fetcher.fetch(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_consecutive_requests_respect_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<p>ok</p>"))
            .mount(&server)
            .await;

        let mut config = create_test_config(1024);
        config.politeness.base_delay_ms = 200;
        config.politeness.max_delay_ms = 1_000;
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        fetcher.fetch(&url).await.unwrap();
        let started = Instant::now();
        fetcher.fetch(&url).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_elapsed_time_counts_toward_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<p>ok</p>"))
            .mount(&server)
            .await;

        let mut config = create_test_config(1024);
        config.politeness.base_delay_ms = 300;
        config.politeness.max_delay_ms = 1_000;
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        // A domain never requested is not delayed
        let started = Instant::now();
        fetcher.fetch(&url).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));

        tokio::time::sleep(Duration::from_millis(350)).await;
        let started = Instant::now();
        fetcher.fetch(&url).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html("<p>sent</p>").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut config = create_test_config(1024);
        config.fetcher.timeout_secs = 1;
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&server.uri()).unwrap();

        let error = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(error, FetchError::Timeout);
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(AllowAllRobots));
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let error = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(error, FetchError::ConnectionRefused);
        assert_eq!(error.kind(), "connection_refused");
    }

    #[tokio::test]
    async fn test_oversized_robots_is_read_up_to_ceiling() {
        let mut robots_txt = String::from("User-agent: *\nDisallow: /private\n");
        while robots_txt.len() < 8 * 1024 {
            robots_txt.push_str("# padding line\n");
        }
        robots_txt.push_str("Disallow: /open\n");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(robots_txt.into_bytes(), "text/plain"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(html("<p>ok</p>"))
            .mount(&server)
            .await;

        let config = create_test_config(1024);
        let fetcher = fetcher(&config, Arc::new(RobotsCache::new("RegioBot")));

        let private = Url::parse(&format!("{}/private", server.uri())).unwrap();
        assert_eq!(
            fetcher.fetch(&private).await.unwrap_err(),
            FetchError::RobotsDisallowed
        );
        // The rule past the ceiling was never read
        let open = Url::parse(&format!("{}/open", server.uri())).unwrap();
        assert!(fetcher.fetch(&open).await.is_ok());
    }
}
