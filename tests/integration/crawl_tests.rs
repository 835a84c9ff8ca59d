//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through the search engine facade.

use regio_search::config::{Config, DomainEntry};
use regio_search::crawler::CrawlOptions;
use regio_search::storage::{share_store, BatchReplay, BatchStore, SqliteBatchStore};
use regio_search::{SearchEngine, SessionState};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a fast, polite-enough test configuration for one mock server
fn create_test_config(dir: &TempDir, seeds: Vec<String>) -> Config {
    let mut config = Config::default();
    config.crawler.workers = 3;
    config.crawler.batch_size = 5;
    config.crawler.max_depth = 3;
    config.politeness.base_delay_ms = 1;
    config.politeness.max_delay_ms = 20;
    config.fetcher.timeout_secs = 5;
    config.fetcher.respect_robots = false;
    config.storage.database_path = dir.path().join("pages.db").display().to_string();
    config.storage.index_path = dir.path().join("index.bin").display().to_string();
    config.domains = vec![DomainEntry {
        domain: "127.0.0.1".to_string(),
        trust: 0.8,
        seeds,
    }];
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

/// Serves `/p/{n}` pages that each link to the next `fanout` pages
struct SyntheticSite {
    pages: usize,
    fanout: usize,
}

impl Respond for SyntheticSite {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n: usize = request
            .url
            .path()
            .trim_start_matches("/p/")
            .parse()
            .unwrap_or(0);
        let links: String = (1..=self.fanout)
            .map(|k| n * self.fanout + k)
            .filter(|child| *child < self.pages)
            .map(|child| format!(r#"<a href="/p/{}">side {}</a>"#, child, child))
            .collect();
        html(&format!(
            "<html><head><title>Side {n}</title></head><body><p>Innhold på side {n} om forskning.</p>{links}</body></html>"
        ))
    }
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Hjem</title><meta name="description" content="Forsiden"></head>
            <body><p>Velkommen</p><a href="/om">Om oss</a><a href="/nyheter">Nyheter</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/om"))
        .respond_with(html("<html><title>Om oss</title><body>Vi driver med forskning.</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nyheter"))
        .respond_with(html("<html><title>Nyheter</title><body>Siste nytt.</body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, vec![format!("{}/", server.uri())]);
    let engine = SearchEngine::open(config).unwrap();

    let report = engine
        .crawl(&["127.0.0.1".to_string()], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.final_state, SessionState::Completed);
    assert_eq!(report.pages_crawled, 3);
    assert_eq!(report.pages_indexed, 3);
    assert_eq!(report.errors, 0);
    assert!(!report.interrupted);

    let stats = engine.store_stats().unwrap();
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.sessions, 1);

    let session = engine.store().lock().latest_session().unwrap().unwrap();
    assert_eq!(session.status, SessionState::Completed);
    assert_eq!(session.pages_crawled, 3);

    let hits = engine.search("forskning", 10, true).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].url.ends_with("/om"));
}

#[tokio::test]
async fn test_buffer_stays_bounded_on_large_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(SyntheticSite {
            pages: 120,
            fanout: 4,
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, vec![format!("{}/p/0", server.uri())]);
    config.crawler.max_depth = 10;
    let batch_size = config.crawler.batch_size;
    let engine = SearchEngine::open(config).unwrap();

    let report = engine
        .crawl(&["127.0.0.1".to_string()], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.pages_crawled, 120);
    assert!(report.peak_buffered <= 2 * batch_size);
    assert!(report.batches_flushed >= 120 / batch_size);

    // Every batch respects the batch size and every page was persisted once
    let replay = BatchReplay::new(engine.store().clone()).unwrap();
    let mut pages = 0;
    for batch in replay {
        let batch = batch.unwrap();
        assert!(batch.pages.len() <= batch_size);
        pages += batch.pages.len();
    }
    assert_eq!(pages, 120);
    assert_eq!(engine.index_stats().documents, 120);
}

#[tokio::test]
async fn test_throttled_domain_is_suspended() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seeds = ["/", "/a", "/b", "/c"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    let mut config = create_test_config(&dir, seeds);
    config.politeness.max_consecutive_throttles = 3;
    let engine = SearchEngine::open(config).unwrap();

    let report = engine
        .crawl(&["127.0.0.1".to_string()], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.pages_crawled, 0);
    assert_eq!(report.suspended_domains, vec!["127.0.0.1".to_string()]);
    assert!(report.errors_of("throttled") >= 4);
    assert_eq!(report.domain("127.0.0.1").unwrap().status, "suspended");
    assert_eq!(report.final_state, SessionState::Completed);
}

#[tokio::test]
async fn test_stop_signal_flushes_pending_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(SyntheticSite {
            pages: 1_000,
            fanout: 3,
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, vec![format!("{}/p/0", server.uri())]);
    config.crawler.max_depth = 20;
    config.politeness.base_delay_ms = 10;
    let engine = SearchEngine::open(config).unwrap();

    let options = CrawlOptions::default();
    let stop = options.stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        stop.stop();
    });

    let report = engine
        .crawl(&["127.0.0.1".to_string()], options)
        .await
        .unwrap();

    assert!(report.interrupted);
    assert!(report.pages_crawled < 1_000);
    // Nothing crawled was lost in the pending buffer
    assert_eq!(
        engine.store_stats().unwrap().pages as usize,
        report.pages_crawled
    );
}

#[tokio::test]
async fn test_sessions_accumulate_in_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<html><title>Eneste</title><body>tekst</body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, vec![format!("{}/", server.uri())]);
    let db_path = config.storage.database_path.clone();
    let engine = SearchEngine::open(config).unwrap();

    for _ in 0..2 {
        engine
            .crawl(&["127.0.0.1".to_string()], CrawlOptions::default())
            .await
            .unwrap();
    }
    drop(engine);

    // The same page crawled twice is two immutable batch rows, one document
    let store = SqliteBatchStore::open(std::path::Path::new(&db_path)).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.pages, 2);

    let shared = share_store(store);
    assert_eq!(BatchReplay::new(shared).unwrap().len(), 2);
}
