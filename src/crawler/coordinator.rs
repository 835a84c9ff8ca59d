//! Crawler coordinator - main crawl orchestration logic
//!
//! This module runs one crawl session:
//! - Seeding the frontier and recording the session in the store
//! - Running a fixed pool of async workers over the frontier
//! - Coordinating fetching, extraction and link discovery
//! - Buffering pages and flushing them in batches
//! - Reacting to suspension, the stop signal and the session timeout

use crate::catalog::DomainCatalog;
use crate::config::Config;
use crate::crawler::buffer::PageBuffer;
use crate::crawler::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::crawler::frontier::{AttemptOutcome, Frontier, FrontierEntry, NextEntry};
use crate::crawler::parser::{HtmlExtractor, ScraperExtractor};
use crate::crawler::rate_limiter::RateLimiter;
use crate::output::{CrawlReport, DomainSummary};
use crate::robots::RobotsPolicy;
use crate::state::SessionState;
use crate::storage::{content_hash, CrawledPage, SharedStore};
use crate::url::{extract_domain, normalize_url};
use crate::RegioError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Retries granted to a URL after a retryable failure
const MAX_RETRIES: u32 = 2;

/// How long an idle worker sleeps before polling the frontier again
const IDLE_POLL: Duration = Duration::from_millis(20);

/// Cooperative cancellation flag shared with a running crawl
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the crawl to drain: in-flight requests finish, nothing new starts
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call overrides of the crawler configuration
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub max_depth: Option<u32>,
    pub max_pages: Option<usize>,
    pub session_timeout: Option<Duration>,
    pub stop: StopSignal,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: SharedStore,
    catalog: Arc<dyn DomainCatalog>,
    extractor: Arc<dyn HtmlExtractor>,
    fetcher: Arc<Fetcher>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The full configuration
    /// * `store` - Batch store receiving flushed pages
    /// * `catalog` - Decides which discovered domains may be crawled
    /// * `robots` - Robots policy consulted by the fetcher
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(RegioError)` - The HTTP client could not be built
    pub fn new(
        config: Arc<Config>,
        store: SharedStore,
        catalog: Arc<dyn DomainCatalog>,
        robots: Arc<dyn RobotsPolicy>,
    ) -> Result<Self, RegioError> {
        let limiter = Arc::new(RateLimiter::new(config.politeness.clone()));
        let fetcher = Arc::new(Fetcher::new(&config, limiter, robots)?);

        Ok(Self {
            config,
            store,
            catalog,
            extractor: Arc::new(ScraperExtractor),
            fetcher,
            config_hash: String::new(),
        })
    }

    /// Replaces the HTML extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn HtmlExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Sets the configuration hash recorded with the session
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Runs one crawl session from the given seed URLs
    ///
    /// Seeds are always crawled; discovered links are followed only when the
    /// catalog allows their domain or it is one of the seed domains.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The session completed (possibly interrupted or
    ///   with suspended domains); every crawled page is persisted
    /// * `Err(RegioError::CrawlAborted)` - The store failed persistently
    pub async fn run(&self, seeds: &[String], options: CrawlOptions) -> Result<CrawlReport, RegioError> {
        let started = Instant::now();
        let session_id = self.store.lock().create_session(&self.config_hash)?;
        let crawler = &self.config.crawler;

        let mut frontier = Frontier::new(crawler);
        if let Some(max_pages) = options.max_pages {
            frontier.set_max_pages(max_pages);
        }

        let mut seed_domains = HashSet::new();
        for seed in seeds {
            match normalize_url(seed) {
                Ok(url) => {
                    let Some(domain) = extract_domain(&url) else {
                        continue;
                    };
                    seed_domains.insert(domain.clone());
                    frontier.push(FrontierEntry::new(url, domain, 0));
                }
                Err(e) => tracing::warn!("Skipping invalid seed {}: {}", seed, e),
            }
        }

        tracing::info!(
            "Starting crawl session {} with {} seeds across {} domains",
            session_id,
            frontier.queued(),
            seed_domains.len()
        );

        let shared = Arc::new(CrawlShared {
            frontier: Mutex::new(frontier),
            buffer: Mutex::new(PageBuffer::new(crawler.batch_size)),
            session: Mutex::new(SessionState::Idle),
            tally: Mutex::new(ErrorTally::default()),
            aborted: Mutex::new(None),
            store: self.store.clone(),
            session_id,
            catalog: self.catalog.clone(),
            extractor: self.extractor.clone(),
            fetcher: self.fetcher.clone(),
            seed_domains,
            max_depth: options.max_depth.unwrap_or(crawler.max_depth),
            deadline: started + options.session_timeout.unwrap_or_else(|| crawler.session_timeout()),
            stop: options.stop.clone(),
        });
        shared.transition(SessionState::Running);

        let workers: Vec<_> = (0..crawler.workers.max(1))
            .map(|id| {
                let shared = shared.clone();
                tokio::spawn(async move { shared.worker_loop(id).await })
            })
            .collect();

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Crawl worker panicked: {}", e);
            }
        }

        let abort_reason = shared.aborted.lock().take();
        if let Some(reason) = abort_reason {
            return Err(self.abort_session(&shared, reason));
        }

        let flushed = shared.buffer.lock().flush_all(&self.store, session_id);
        if let Err(e) = flushed {
            return Err(self.abort_session(&shared, format!("final flush failed: {}", e)));
        }

        shared.transition(SessionState::Completed);

        let report = shared.report(started.elapsed());
        self.store
            .lock()
            .finish_session(session_id, SessionState::Completed, report.pages_crawled as u64)?;

        tracing::info!(
            "Crawl session {} completed: {} pages, {} errors, {} batches in {:?}",
            session_id,
            report.pages_crawled,
            report.errors,
            report.batches_flushed,
            report.duration
        );

        Ok(report)
    }

    /// Marks the session aborted and builds the error reported to the caller
    ///
    /// Recording the terminal status is best effort: the store is the thing
    /// that failed, so a second failure is only logged.
    fn abort_session(&self, shared: &CrawlShared, reason: String) -> RegioError {
        let unpersisted = shared.buffer.lock().unpersisted();
        let pages_crawled = shared.frontier.lock().pages_crawled();
        shared.transition(SessionState::Aborted);

        tracing::error!(
            "Crawl session {} aborted with {} pages not persisted: {}",
            shared.session_id,
            unpersisted,
            reason
        );
        if let Err(e) = self.store.lock().finish_session(
            shared.session_id,
            SessionState::Aborted,
            pages_crawled.saturating_sub(unpersisted) as u64,
        ) {
            tracing::warn!("Could not record abort of session {}: {}", shared.session_id, e);
        }

        RegioError::CrawlAborted(format!(
            "{} ({} crawled pages not persisted)",
            reason, unpersisted
        ))
    }
}

/// Failed attempts by kind plus suspension bookkeeping
#[derive(Debug, Default)]
struct ErrorTally {
    by_kind: BTreeMap<String, usize>,
    suspended: Vec<String>,
    interrupted: bool,
}

impl ErrorTally {
    fn record(&mut self, kind: &str) {
        *self.by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }
}

/// State shared by the workers of one session
struct CrawlShared {
    frontier: Mutex<Frontier>,
    buffer: Mutex<PageBuffer>,
    session: Mutex<SessionState>,
    tally: Mutex<ErrorTally>,
    aborted: Mutex<Option<String>>,
    store: SharedStore,
    session_id: i64,
    catalog: Arc<dyn DomainCatalog>,
    extractor: Arc<dyn HtmlExtractor>,
    fetcher: Arc<Fetcher>,
    seed_domains: HashSet<String>,
    max_depth: u32,
    deadline: Instant,
    stop: StopSignal,
}

impl CrawlShared {
    async fn worker_loop(&self, id: usize) {
        tracing::debug!("Worker {} started", id);

        loop {
            if self.should_drain() {
                break;
            }

            let next = self.frontier.lock().next();
            let entry = match next {
                NextEntry::Ready(entry) => entry,
                NextEntry::Wait => {
                    tokio::time::sleep(IDLE_POLL).await;
                    continue;
                }
                NextEntry::Finished => break,
            };

            let result = self.fetcher.fetch(&entry.url).await;
            self.handle_result(entry, result);
        }

        tracing::debug!("Worker {} stopped", id);
    }

    /// Checks for stop conditions, moving the session to Draining when hit
    fn should_drain(&self) -> bool {
        if self.aborted.lock().is_some() {
            return true;
        }

        let stopped = self.stop.is_stopped();
        let timed_out = Instant::now() >= self.deadline;
        if stopped || timed_out {
            let mut tally = self.tally.lock();
            if !tally.interrupted {
                tally.interrupted = true;
                tracing::info!(
                    "Draining crawl: {}",
                    if stopped { "stop requested" } else { "session timeout" }
                );
            }
            drop(tally);
            self.transition(SessionState::Draining);
            return true;
        }

        false
    }

    fn handle_result(&self, entry: FrontierEntry, result: Result<FetchedPage, FetchError>) {
        let domain = entry.domain.clone();

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                self.handle_fetch_error(entry, error);
                return;
            }
        };

        let extracted = match self.extractor.extract(&fetched.body, &fetched.final_url) {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::debug!("Failed to parse {}: {}", entry.url, e);
                self.tally.lock().record("parse_error");
                self.frontier.lock().complete(&domain, AttemptOutcome::Failed);
                return;
            }
        };

        let page = CrawledPage {
            url: entry.url.to_string(),
            domain: domain.clone(),
            title: extracted.title,
            description: extracted.description,
            content_hash: content_hash(&extracted.text),
            text: extracted.text,
            status_code: fetched.status_code,
            fetched_at: fetched.fetched_at,
            outbound_links: extracted.links,
            depth: entry.depth,
        };

        {
            let mut frontier = self.frontier.lock();
            if entry.depth < self.max_depth {
                for link in &page.outbound_links {
                    if let Some(child) = self.child_entry(link, entry.depth + 1) {
                        frontier.push(child);
                    }
                }
            }
            frontier.complete(&domain, AttemptOutcome::Success);
        }

        let pushed = self
            .buffer
            .lock()
            .push(page, &self.store, self.session_id);
        if let Err(e) = pushed {
            tracing::error!("Store unavailable, aborting crawl: {}", e);
            let mut aborted = self.aborted.lock();
            if aborted.is_none() {
                *aborted = Some(e.to_string());
            }
        }
    }

    fn handle_fetch_error(&self, entry: FrontierEntry, error: FetchError) {
        let domain = entry.domain.clone();
        tracing::debug!("Fetch of {} failed: {}", entry.url, error);
        self.tally.lock().record(error.kind());

        let mut frontier = self.frontier.lock();
        frontier.complete(&domain, AttemptOutcome::Failed);

        if matches!(error, FetchError::Throttled(_)) && self.fetcher.limiter().is_suspended(&domain) {
            let dropped = frontier.suspend(&domain);
            drop(frontier);
            tracing::warn!("Domain {} suspended, dropped {} queued URLs", domain, dropped);
            self.tally.lock().suspended.push(domain);
            self.transition(SessionState::SuspendedPartial);
            return;
        }

        if error.is_retryable() && entry.attempts < MAX_RETRIES {
            frontier.requeue(entry);
        }
    }

    /// Builds a frontier entry for a discovered link if it may be crawled
    fn child_entry(&self, link: &str, depth: u32) -> Option<FrontierEntry> {
        let url = Url::parse(link).ok()?;
        let domain = extract_domain(&url)?;
        if !self.seed_domains.contains(&domain) && !self.catalog.is_allowed(&domain) {
            return None;
        }
        Some(FrontierEntry::new(url, domain, depth))
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.session.lock();
        if *state == next || !state.can_transition_to(next) {
            return;
        }
        tracing::info!("Crawl session {}: {} -> {}", self.session_id, *state, next);
        *state = next;
    }

    fn report(&self, duration: Duration) -> CrawlReport {
        let frontier = self.frontier.lock();
        let buffer = self.buffer.lock();
        let tally = self.tally.lock();

        let domains = frontier
            .domains()
            .into_iter()
            .map(|(domain, progress)| DomainSummary {
                domain,
                status: progress.status.as_str().to_string(),
                pages_crawled: progress.pages_crawled,
                attempts: progress.attempts,
                errors: progress.errors,
                dropped: progress.dropped,
                queued: progress.queued(),
            })
            .collect();

        let mut suspended = tally.suspended.clone();
        suspended.sort();
        suspended.dedup();

        CrawlReport {
            session_id: self.session_id,
            final_state: *self.session.lock(),
            pages_crawled: frontier.pages_crawled(),
            pages_indexed: 0,
            errors: tally.by_kind.values().sum(),
            errors_by_kind: tally.by_kind.clone(),
            batches_flushed: buffer.batches_flushed(),
            peak_buffered: buffer.peak(),
            suspended_domains: suspended,
            interrupted: tally.interrupted,
            domains,
            duration,
        }
    }
}
