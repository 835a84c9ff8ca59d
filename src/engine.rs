//! Search engine facade
//!
//! [`SearchEngine`] ties the pipeline together: it runs crawl sessions,
//! replays flushed batches into a new index, publishes the index through
//! an atomic file replace plus an in-memory swap, and answers ranked
//! queries through a bounded result cache.

use crate::cache::{search_key, CacheManager, CacheStats, Weigh};
use crate::catalog::{ConfigCatalog, DomainCatalog};
use crate::config::{validate, Config};
use crate::crawler::{Coordinator, CrawlOptions};
use crate::index::{
    excerpt, load_snapshot, save_snapshot, DocId, DocumentRecord, IndexError, IndexHandle,
    IndexSnapshot, IndexStats, IndexerPipeline, InvertedIndex,
};
use crate::output::CrawlReport;
use crate::ranking::RankingEngine;
use crate::robots::{AllowAllRobots, RobotsCache, RobotsPolicy};
use crate::storage::{share_store, BatchReplay, SharedStore, SqliteBatchStore, StoreStats};
use crate::text::{StemmingTokenizer, Tokenizer, UnicodeTokenizer};
use crate::url::{extract_domain, normalize_url};
use crate::{ConfigError, RegioError, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Characters of description or excerpt shown per hit
const SNIPPET_CHARS: usize = 200;

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

impl SearchHit {
    fn from_record(record: &DocumentRecord, score: f64) -> Self {
        let snippet = match record.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => excerpt(description, SNIPPET_CHARS),
            _ => excerpt(&record.excerpt, SNIPPET_CHARS),
        };
        Self {
            doc_id: record.id,
            url: record.url.clone(),
            title: record.display_title().to_string(),
            snippet,
            score,
        }
    }
}

impl Weigh for SearchHit {
    fn weight(&self) -> usize {
        size_of::<Self>() + self.url.capacity() + self.title.capacity() + self.snippet.capacity()
    }
}

/// Entry point for crawling, indexing and searching
pub struct SearchEngine {
    config: Arc<Config>,
    config_hash: String,
    store: SharedStore,
    catalog: Arc<ConfigCatalog>,
    robots: Arc<dyn RobotsPolicy>,
    tokenizer: Arc<dyn Tokenizer>,
    ranking: RankingEngine,
    index: IndexHandle,
    index_path: PathBuf,
    /// Why no index is being served, when none is
    unavailable: RwLock<Option<String>>,
    results: CacheManager<Vec<SearchHit>>,
    queries: CacheManager<Vec<String>>,
    /// Serializes index builds; the index has a single writer
    build_lock: Mutex<()>,
}

impl SearchEngine {
    /// Opens the engine on the SQLite store named in the configuration
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteBatchStore::open(Path::new(&config.storage.database_path))?;
        Self::with_store(config, share_store(store))
    }

    /// Opens the engine on an existing store
    ///
    /// The configuration is validated first. A previously saved index is
    /// loaded if present; a corrupt one is refused and queries report the
    /// index as unavailable until the next successful build.
    pub fn with_store(config: Config, store: SharedStore) -> Result<Self> {
        validate(&config)?;

        let catalog = Arc::new(ConfigCatalog::new(config.domains.clone()));
        let robots: Arc<dyn RobotsPolicy> = if config.fetcher.respect_robots {
            Arc::new(RobotsCache::new(config.user_agent.crawler_name.clone()))
        } else {
            Arc::new(AllowAllRobots)
        };
        let tokenizer: Arc<dyn Tokenizer> = if config.indexer.stemming {
            Arc::new(StemmingTokenizer(UnicodeTokenizer))
        } else {
            Arc::new(UnicodeTokenizer)
        };
        let ranking = RankingEngine::new(
            config.ranking.clone(),
            &config.regional,
            catalog.clone() as Arc<dyn DomainCatalog>,
        );

        let engine = Self {
            index_path: PathBuf::from(&config.storage.index_path),
            results: CacheManager::new(&config.cache),
            queries: CacheManager::new(&config.cache),
            config: Arc::new(config),
            config_hash: String::new(),
            store,
            catalog,
            robots,
            tokenizer,
            ranking,
            index: IndexHandle::new(),
            unavailable: RwLock::new(Some("no index has been built".to_string())),
            build_lock: Mutex::new(()),
        };
        engine.load_saved_index();
        Ok(engine)
    }

    /// Sets the configuration hash recorded with crawl sessions
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Replaces the tokenizer used for indexing and queries
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    fn load_saved_index(&self) {
        match load_snapshot(&self.index_path) {
            Ok(snapshot) => {
                info!(
                    "Loaded index with {} documents from {}",
                    snapshot.index.document_count(),
                    self.index_path.display()
                );
                self.publish(snapshot);
            }
            Err(IndexError::NotFound(path)) => {
                debug!("No saved index at {}", path.display());
            }
            Err(e) => {
                warn!("Refusing to serve index at {}: {}", self.index_path.display(), e);
                *self.unavailable.write() = Some(format!("saved index rejected: {}", e));
            }
        }
    }

    /// Crawls the given domains, then indexes the new batches
    ///
    /// An empty `seed_domains` slice crawls every catalog entry. Domains
    /// without configured seeds start from their root URL.
    pub async fn crawl(&self, seed_domains: &[String], options: CrawlOptions) -> Result<CrawlReport> {
        let seeds = self.seed_urls(seed_domains);
        if seeds.is_empty() {
            return Err(ConfigError::Validation("no seed URLs to crawl".to_string()).into());
        }

        let coordinator = Coordinator::new(
            self.config.clone(),
            self.store.clone(),
            self.catalog.clone() as Arc<dyn DomainCatalog>,
            self.robots.clone(),
        )?
        .with_config_hash(self.config_hash.clone());

        let mut report = coordinator.run(&seeds, options).await?;
        let stats = self.update_index()?;
        report.pages_indexed = stats.documents;
        Ok(report)
    }

    fn seed_urls(&self, domains: &[String]) -> Vec<String> {
        let mut seeds = self.catalog.seeds_for(domains);
        for domain in domains {
            let domain = domain.to_lowercase();
            let covered = seeds.iter().any(|seed| {
                normalize_url(seed)
                    .ok()
                    .and_then(|url| extract_domain(&url))
                    .is_some_and(|d| d == domain)
            });
            if !covered && !domain.starts_with("*.") {
                seeds.push(format!("https://{}/", domain));
            }
        }
        seeds
    }

    /// Indexes batches the current index has not seen and publishes the result
    pub fn update_index(&self) -> Result<IndexStats> {
        let _build = self.build_lock.lock();
        let base = self
            .index
            .current()
            .map(|snapshot| snapshot.index.clone())
            .unwrap_or_default();
        self.build_and_publish(base)
    }

    /// Rebuilds the index from every stored batch
    pub fn rebuild_index(&self) -> Result<IndexStats> {
        let _build = self.build_lock.lock();
        self.build_and_publish(InvertedIndex::new())
    }

    fn build_and_publish(&self, base: InvertedIndex) -> Result<IndexStats> {
        let mut pipeline =
            IndexerPipeline::resume(base, self.tokenizer.clone(), self.config.indexer.clone());
        let replay = BatchReplay::new(self.store.clone())?;
        let summary = pipeline.run(replay)?;
        info!(
            "Indexed {} batches ({} skipped): {} added, {} replaced",
            summary.batches_indexed,
            summary.batches_skipped,
            summary.documents_added,
            summary.documents_replaced
        );

        let snapshot = IndexSnapshot::build(pipeline.finish(), &self.config.ranking, Utc::now());
        save_snapshot(&self.index_path, &snapshot)?;
        let stats = snapshot.stats();
        self.publish(snapshot);
        Ok(stats)
    }

    fn publish(&self, snapshot: IndexSnapshot) {
        self.index.swap(Arc::new(snapshot));
        *self.unavailable.write() = None;
        self.results.clear();
    }

    /// Ranked results for a free-text query
    ///
    /// Fails with [`RegioError::IndexUnavailable`] when no verified index is
    /// loaded, so "no matches" and "not ready" stay distinguishable.
    pub fn search(&self, query: &str, max_results: usize, diversify: bool) -> Result<Vec<SearchHit>> {
        let snapshot = self.index.current().ok_or_else(|| {
            RegioError::IndexUnavailable(
                self.unavailable
                    .read()
                    .clone()
                    .unwrap_or_else(|| "no index loaded".to_string()),
            )
        })?;

        let key = search_key(query, max_results, diversify);
        if let Some(hits) = self.results.get(&key) {
            debug!("Result cache hit for '{}'", query);
            return Ok(hits);
        }

        let terms = self.query_terms(query);
        let hits = if terms.is_empty() || max_results == 0 {
            Vec::new()
        } else {
            let candidates = snapshot.index.candidates(&terms);
            let mut ranked = self.ranking.rank(&snapshot, &terms, &candidates);
            if diversify {
                ranked = self.ranking.diversify(&snapshot, ranked);
            }
            ranked
                .into_iter()
                .take(max_results)
                .filter_map(|r| {
                    snapshot
                        .index
                        .document(r.doc_id)
                        .map(|record| SearchHit::from_record(record, r.score))
                })
                .collect()
        };

        debug!("Query '{}' -> {} terms, {} hits", query, terms.len(), hits.len());
        self.results.put(key, hits.clone(), None);
        Ok(hits)
    }

    /// Tokenized query, memoized per query string
    fn query_terms(&self, query: &str) -> Vec<String> {
        let key = query.trim();
        if let Some(terms) = self.queries.get(key) {
            return terms;
        }
        let terms = self.tokenizer.terms(key, &self.config.indexer.locale);
        self.queries.put(key, terms.clone(), None);
        terms
    }

    /// Result cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.results.stats()
    }

    /// Query normalization cache counters
    pub fn query_cache_stats(&self) -> CacheStats {
        self.queries.stats()
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index
            .current()
            .map(|snapshot| snapshot.stats())
            .unwrap_or_else(IndexStats::empty)
    }

    pub fn is_index_available(&self) -> bool {
        self.index.is_loaded()
    }

    pub fn store_stats(&self) -> Result<StoreStats> {
        Ok(self.store.lock().stats()?)
    }
}
