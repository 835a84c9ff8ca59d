//! Integration tests for indexing and search
//!
//! The end-to-end test crawls two mock sites under their own host names via
//! the fetcher's DNS overrides; the remaining tests seed the batch store
//! directly and exercise indexing, persistence and ranking.

use chrono::Utc;
use regio_search::config::{Config, DomainEntry, ResolveEntry};
use regio_search::crawler::CrawlOptions;
use regio_search::storage::{content_hash, BatchStore, CrawledPage, SqliteBatchStore};
use regio_search::{RegioError, SearchEngine};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.workers = 2;
    config.crawler.batch_size = 4;
    config.politeness.base_delay_ms = 1;
    config.politeness.max_delay_ms = 20;
    config.fetcher.timeout_secs = 5;
    config.fetcher.respect_robots = false;
    config.storage.database_path = dir.path().join("pages.db").display().to_string();
    config.storage.index_path = dir.path().join("index.bin").display().to_string();
    config
}

fn crawled(url: &str, domain: &str, title: &str, text: &str) -> CrawledPage {
    CrawledPage {
        url: url.to_string(),
        domain: domain.to_string(),
        title: Some(title.to_string()),
        description: None,
        text: text.to_string(),
        content_hash: content_hash(text),
        status_code: 200,
        fetched_at: Utc::now(),
        outbound_links: Vec::new(),
        depth: 0,
    }
}

/// Appends `pages` as one batch of a new session in the configured store
fn append_pages(config: &Config, pages: &[CrawledPage]) {
    let mut store = SqliteBatchStore::open(Path::new(&config.storage.database_path)).unwrap();
    let session = store.create_session("test").unwrap();
    store.append_batch(session, pages).unwrap();
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html"))
        .mount(server)
        .await;
}

async fn regional_site(home_title: &str, article: (&str, &str, &str)) -> MockServer {
    let (route, title, body) = article;
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><head><title>{home_title}</title></head><body><p>Velkommen.</p>
            <a href="{route}">Les mer</a><a href="/kontakt">Kontakt</a></body></html>"#
        ),
    )
    .await;
    mount_page(
        &server,
        route,
        &format!("<html><head><title>{title}</title></head><body><p>{body}</p></body></html>"),
    )
    .await;
    mount_page(
        &server,
        "/kontakt",
        "<html><head><title>Kontakt</title></head><body><p>Telefon og adresse.</p></body></html>",
    )
    .await;
    server
}

#[tokio::test]
async fn test_end_to_end_title_match_outranks_body_mention() {
    let site_a = regional_site(
        "A hjem",
        ("/forskning", "Forskning", "Forskning og innovasjon ved instituttet."),
    )
    .await;
    let site_b = regional_site(
        "B hjem",
        (
            "/nyheter",
            "Nyheter",
            "Nyheter fra regionen om kultur, sport, økonomi, politikk, helse, forskning, skole og samferdsel i hele fylket.",
        ),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.crawler.max_depth = 1;
    for (host, server) in [("a.test", &site_a), ("b.test", &site_b)] {
        let port = server.address().port();
        config.fetcher.resolve.push(ResolveEntry {
            host: host.to_string(),
            addr: format!("127.0.0.1:{}", port),
        });
        config.domains.push(DomainEntry {
            domain: host.to_string(),
            trust: 0.8,
            seeds: vec![format!("http://{}:{}/", host, port)],
        });
    }

    let engine = SearchEngine::open(config).unwrap();
    let report = engine
        .crawl(&["a.test".to_string(), "b.test".to_string()], CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(report.pages_crawled, 6);
    assert_eq!(report.pages_indexed, 6);
    assert_eq!(report.errors, 0);

    let hits = engine.search("forskning", 10, true).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].url.contains("a.test"));
    assert!(hits[0].url.ends_with("/forskning"));
    assert_eq!(hits[0].title, "Forskning");
    assert!(hits[1].url.contains("b.test"));
    assert!(hits[1].url.ends_with("/nyheter"));
    assert!(hits[0].score > hits[1].score);
    assert!(hits.iter().all(|hit| (0.0..=1.0).contains(&hit.score)));

    assert!(engine.search("ukjentord", 10, true).unwrap().is_empty());
}

#[test]
fn test_reindex_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    append_pages(
        &config,
        &[
            crawled("https://a.test/1", "a.test", "Forskning", "forskning i nord"),
            crawled("https://a.test/2", "a.test", "Sykkel", "sykkelveier i byen"),
        ],
    );
    let engine = SearchEngine::open(config).unwrap();

    let first = engine.update_index().unwrap();
    let first_hits = engine.search("forskning", 10, true).unwrap();

    let second = engine.update_index().unwrap();
    assert_eq!(second.documents, first.documents);
    assert_eq!(second.terms, first.terms);
    assert_eq!(second.postings, first.postings);
    assert_eq!(second.processed_batches, 1);

    let rebuilt = engine.rebuild_index().unwrap();
    assert_eq!(rebuilt.documents, first.documents);
    assert_eq!(rebuilt.postings, first.postings);

    let hits = engine.search("forskning", 10, true).unwrap();
    assert_eq!(hits.len(), first_hits.len());
    assert_eq!(hits[0].doc_id, first_hits[0].doc_id);
}

#[test]
fn test_recrawled_page_replaces_earlier_version() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Side", "gammel tekst")]);
    let engine = SearchEngine::open(config.clone()).unwrap();
    engine.update_index().unwrap();
    assert_eq!(engine.search("gammel", 10, true).unwrap().len(), 1);

    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Side", "ny tekst")]);
    let stats = engine.update_index().unwrap();

    assert_eq!(stats.documents, 1);
    assert_eq!(stats.processed_batches, 2);
    assert!(engine.search("gammel", 10, true).unwrap().is_empty());
    assert_eq!(engine.search("ny", 10, true).unwrap().len(), 1);
}

#[test]
fn test_search_before_first_build_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let engine = SearchEngine::open(base_config(&dir)).unwrap();

    assert!(!engine.is_index_available());
    assert!(matches!(
        engine.search("forskning", 10, true),
        Err(RegioError::IndexUnavailable(_))
    ));
}

#[test]
fn test_saved_index_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Forskning", "forskning")]);
    {
        let engine = SearchEngine::open(config.clone()).unwrap();
        engine.update_index().unwrap();
    }

    let reopened = SearchEngine::open(config).unwrap();
    assert!(reopened.is_index_available());
    assert_eq!(reopened.index_stats().documents, 1);
    assert_eq!(reopened.search("forskning", 10, true).unwrap().len(), 1);
}

#[test]
fn test_corrupt_index_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Forskning", "forskning")]);
    {
        let engine = SearchEngine::open(config.clone()).unwrap();
        engine.update_index().unwrap();
    }

    let index_path = Path::new(&config.storage.index_path);
    let mut bytes = std::fs::read(index_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(index_path, &bytes).unwrap();

    let engine = SearchEngine::open(config).unwrap();
    assert!(!engine.is_index_available());
    match engine.search("forskning", 10, true) {
        Err(RegioError::IndexUnavailable(reason)) => assert!(reason.contains("rejected")),
        other => panic!("expected IndexUnavailable, got {:?}", other),
    }

    // A rebuild from the batch store restores service
    engine.rebuild_index().unwrap();
    assert_eq!(engine.search("forskning", 10, true).unwrap().len(), 1);
}

#[test]
fn test_diversity_caps_results_per_domain() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    let cap = config.ranking.diversity_cap;
    let mut pages: Vec<CrawledPage> = (0..5)
        .map(|i| {
            crawled(
                &format!("https://a.test/{}", i),
                "a.test",
                &format!("Forskning {}", i),
                "forskning og utvikling",
            )
        })
        .collect();
    pages.push(crawled("https://b.test/1", "b.test", "Rapport", "ny forskning fra b"));
    append_pages(&config, &pages);

    let engine = SearchEngine::open(config).unwrap();
    engine.update_index().unwrap();

    let diverse = engine.search("forskning", 10, true).unwrap();
    let from_a = diverse.iter().filter(|h| h.url.contains("a.test")).count();
    assert_eq!(from_a, cap);
    assert_eq!(diverse.len(), cap + 1);

    let all = engine.search("forskning", 10, false).unwrap();
    assert_eq!(all.len(), 6);

    let limited = engine.search("forskning", 2, false).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[..], all[..2]);
}

#[test]
fn test_reindex_invalidates_cached_results() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir);
    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Forskning", "forskning")]);
    let engine = SearchEngine::open(config.clone()).unwrap();
    engine.update_index().unwrap();

    assert!(engine.search("sykkel", 10, true).unwrap().is_empty());
    assert!(engine.search("sykkel", 10, true).unwrap().is_empty());
    assert_eq!(engine.cache_stats().hits, 1);

    append_pages(&config, &[crawled("https://a.test/2", "a.test", "Sykkel", "sykkel")]);
    engine.update_index().unwrap();

    assert_eq!(engine.cache_stats().items, 0);
    assert_eq!(engine.search("sykkel", 10, true).unwrap().len(), 1);
}

#[test]
fn test_stemming_matches_inflected_forms() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    append_pages(&config, &[crawled("https://a.test/1", "a.test", "Skolene", "skolene i fylket")]);

    let plain = SearchEngine::open(config.clone()).unwrap();
    plain.update_index().unwrap();
    assert!(plain.search("skole", 10, true).unwrap().is_empty());
    drop(plain);

    config.indexer.stemming = true;
    let stemmed = SearchEngine::open(config).unwrap();
    stemmed.rebuild_index().unwrap();
    let hits = stemmed.search("skole", 10, true).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].url.ends_with("/1"));
}
