//! Crawl frontier with per-domain queues and round-robin scheduling
//!
//! This module handles:
//! - Bounded FIFO queues of URLs, one per domain
//! - Deduplication of URLs seen during the session
//! - Domain leasing: at most one request per domain is in flight
//! - Round-robin selection across domains, with unhealthy domains served last
//! - Global and per-domain page ceilings

use crate::config::CrawlerConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub domain: String,
    /// Link depth from the seed (seeds are depth 0)
    pub depth: u32,
    /// Failed attempts so far
    pub attempts: u32,
}

impl FrontierEntry {
    pub fn new(url: Url, domain: impl Into<String>, depth: u32) -> Self {
        Self {
            url,
            domain: domain.into(),
            depth,
            attempts: 0,
        }
    }
}

/// Lifecycle of a domain within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainStatus {
    /// Has or may receive queued URLs
    Active,
    /// Reached the per-domain page ceiling
    PageLimitReached,
    /// Suspended after repeated throttling
    Suspended,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Active => "active",
            DomainStatus::PageLimitReached => "page_limit",
            DomainStatus::Suspended => "suspended",
        }
    }
}

/// Result of a crawl attempt, reported back to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed,
}

/// What a worker should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextEntry {
    /// Crawl this entry; its domain is leased until [`Frontier::complete`]
    Ready(FrontierEntry),
    /// Nothing is available right now but requests are in flight
    Wait,
    /// No work remains
    Finished,
}

/// Per-domain crawl progress
#[derive(Debug, Clone)]
pub struct DomainProgress {
    queue: VecDeque<FrontierEntry>,
    pub status: DomainStatus,
    pub pages_crawled: usize,
    pub attempts: u32,
    pub errors: u32,
    /// URLs refused because the queue was full
    pub dropped: usize,
    in_flight: bool,
}

impl DomainProgress {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            status: DomainStatus::Active,
            pages_crawled: 0,
            attempts: 0,
            errors: 0,
            dropped: 0,
            in_flight: false,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Fraction of attempts that failed
    pub fn error_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.errors as f64 / self.attempts as f64
        }
    }
}

/// Frontier shared by the crawl workers behind a mutex
#[derive(Debug)]
pub struct Frontier {
    domains: HashMap<String, DomainProgress>,
    /// Round-robin order of domain names
    order: VecDeque<String>,
    visited: HashSet<String>,
    max_queue_per_domain: usize,
    max_pages: usize,
    max_pages_per_domain: usize,
    error_rate_threshold: f64,
    error_rate_min_attempts: u32,
    pages_crawled: usize,
    in_flight: usize,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `config` - Queue bounds, page ceilings and error-rate thresholds
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            domains: HashMap::new(),
            order: VecDeque::new(),
            visited: HashSet::new(),
            max_queue_per_domain: config.max_frontier_per_domain,
            max_pages: config.max_pages,
            max_pages_per_domain: config.max_pages_per_domain,
            error_rate_threshold: config.error_rate_threshold,
            error_rate_min_attempts: config.error_rate_min_attempts,
            pages_crawled: 0,
            in_flight: 0,
        }
    }

    /// Overrides the global page ceiling
    pub fn set_max_pages(&mut self, max_pages: usize) {
        self.max_pages = max_pages;
    }

    /// Enqueues an entry unless its URL was already seen
    ///
    /// Returns `true` if the entry was queued. Entries for inactive domains and
    /// entries beyond the queue bound are refused.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if self.visited.contains(entry.url.as_str()) {
            return false;
        }

        let max_queue = self.max_queue_per_domain;
        let progress = self.progress_mut(&entry.domain);
        if progress.status != DomainStatus::Active {
            return false;
        }
        if progress.queue.len() >= max_queue {
            progress.dropped += 1;
            return false;
        }

        self.visited.insert(entry.url.to_string());
        self.progress_mut(&entry.domain).queue.push_back(entry);
        true
    }

    /// Puts a failed entry back at the end of its domain queue
    pub fn requeue(&mut self, mut entry: FrontierEntry) -> bool {
        entry.attempts += 1;
        let progress = self.progress_mut(&entry.domain);
        if progress.status != DomainStatus::Active {
            return false;
        }
        progress.queue.push_back(entry);
        true
    }

    /// Leases the next entry, visiting domains round-robin
    ///
    /// Healthy domains are served first. A domain whose error rate exceeded
    /// the threshold is only served when no healthy domain has work ready.
    pub fn next(&mut self) -> NextEntry {
        if self.global_limit_reached() {
            return if self.in_flight > 0 {
                NextEntry::Wait
            } else {
                NextEntry::Finished
            };
        }

        let pick = self
            .find_ready(false)
            .or_else(|| self.find_ready(true));

        let Some(position) = pick else {
            return if self.in_flight > 0 {
                NextEntry::Wait
            } else {
                NextEntry::Finished
            };
        };

        let Some(domain) = self.order.remove(position) else {
            return NextEntry::Wait;
        };
        self.order.push_back(domain.clone());

        let progress = self.progress_mut(&domain);
        match progress.queue.pop_front() {
            Some(entry) => {
                progress.in_flight = true;
                self.in_flight += 1;
                NextEntry::Ready(entry)
            }
            None => NextEntry::Wait,
        }
    }

    /// Releases the lease on `domain` and records the attempt
    pub fn complete(&mut self, domain: &str, outcome: AttemptOutcome) {
        let max_pages_per_domain = self.max_pages_per_domain;
        let threshold = self.error_rate_threshold;
        let min_attempts = self.error_rate_min_attempts;

        let Some(progress) = self.domains.get_mut(domain) else {
            return;
        };
        if progress.in_flight {
            progress.in_flight = false;
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        progress.attempts += 1;
        match outcome {
            AttemptOutcome::Success => {
                progress.pages_crawled += 1;
                self.pages_crawled += 1;
            }
            AttemptOutcome::Failed => progress.errors += 1,
        }

        if progress.status == DomainStatus::Active
            && progress.pages_crawled >= max_pages_per_domain
        {
            tracing::info!("{} reached the per-domain page limit", domain);
            progress.status = DomainStatus::PageLimitReached;
            progress.queue.clear();
        }

        if outcome == AttemptOutcome::Failed
            && progress.attempts >= min_attempts
            && progress.error_rate() > threshold
        {
            tracing::debug!(
                "Deprioritizing {} (error rate {:.2})",
                domain,
                progress.error_rate()
            );
        }
    }

    /// Stops scheduling `domain` and drops its queued URLs
    ///
    /// Returns the number of URLs dropped.
    pub fn suspend(&mut self, domain: &str) -> usize {
        let progress = self.progress_mut(domain);
        progress.status = DomainStatus::Suspended;
        let dropped = progress.queue.len();
        progress.queue.clear();
        dropped
    }

    /// Whether the URL was already queued in this session
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages_crawled
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Total URLs waiting in all domain queues
    pub fn queued(&self) -> usize {
        self.domains.values().map(|p| p.queue.len()).sum()
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainProgress> {
        self.domains.get(domain)
    }

    /// Progress of every domain, sorted by name
    pub fn domains(&self) -> Vec<(String, DomainProgress)> {
        let mut all: Vec<(String, DomainProgress)> = self
            .domains
            .iter()
            .map(|(name, progress)| (name.clone(), progress.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn global_limit_reached(&self) -> bool {
        self.pages_crawled + self.in_flight >= self.max_pages
    }

    fn is_deprioritized(&self, progress: &DomainProgress) -> bool {
        progress.attempts >= self.error_rate_min_attempts
            && progress.error_rate() > self.error_rate_threshold
    }

    /// Position in `order` of the first domain with work ready
    fn find_ready(&self, deprioritized: bool) -> Option<usize> {
        self.order.iter().position(|name| {
            self.domains.get(name).is_some_and(|progress| {
                progress.status == DomainStatus::Active
                    && !progress.in_flight
                    && !progress.queue.is_empty()
                    && self.is_deprioritized(progress) == deprioritized
            })
        })
    }

    fn progress_mut(&mut self, domain: &str) -> &mut DomainProgress {
        if !self.domains.contains_key(domain) {
            self.order.push_back(domain.to_string());
        }
        self.domains
            .entry(domain.to_string())
            .or_insert_with(DomainProgress::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> CrawlerConfig {
        CrawlerConfig {
            max_depth: 2,
            workers: 2,
            batch_size: 10,
            max_pages: 100,
            max_pages_per_domain: 10,
            max_frontier_per_domain: 3,
            session_timeout_secs: 60,
            error_rate_threshold: 0.5,
            error_rate_min_attempts: 2,
        }
    }

    fn entry(url: &str) -> FrontierEntry {
        let url = Url::parse(url).unwrap();
        let domain = url.host_str().unwrap().to_string();
        FrontierEntry::new(url, domain, 0)
    }

    fn ready(frontier: &mut Frontier) -> FrontierEntry {
        match frontier.next() {
            NextEntry::Ready(entry) => entry,
            other => panic!("expected ready entry, got {:?}", other),
        }
    }

    #[test]
    fn test_push_deduplicates() {
        let mut frontier = Frontier::new(&create_test_config());
        assert!(frontier.push(entry("https://a.no/1")));
        assert!(!frontier.push(entry("https://a.no/1")));
        assert_eq!(frontier.queued(), 1);
        assert!(frontier.is_visited("https://a.no/1"));
    }

    #[test]
    fn test_queue_is_bounded() {
        let mut frontier = Frontier::new(&create_test_config());
        for i in 0..5 {
            frontier.push(entry(&format!("https://a.no/{}", i)));
        }
        assert_eq!(frontier.queued(), 3);
        assert_eq!(frontier.domain("a.no").unwrap().dropped, 2);
        // refused URLs may be offered again later
        assert!(!frontier.is_visited("https://a.no/4"));
    }

    #[test]
    fn test_one_request_in_flight_per_domain() {
        let mut frontier = Frontier::new(&create_test_config());
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://a.no/2"));

        let first = ready(&mut frontier);
        assert_eq!(first.url.as_str(), "https://a.no/1");
        assert_eq!(frontier.next(), NextEntry::Wait);

        frontier.complete("a.no", AttemptOutcome::Success);
        assert_eq!(ready(&mut frontier).url.as_str(), "https://a.no/2");
    }

    #[test]
    fn test_round_robin_across_domains() {
        let mut frontier = Frontier::new(&create_test_config());
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://a.no/2"));
        frontier.push(entry("https://b.no/1"));
        frontier.push(entry("https://b.no/2"));

        let mut order = Vec::new();
        for _ in 0..4 {
            let next = ready(&mut frontier);
            order.push(next.domain.clone());
            frontier.complete(&next.domain, AttemptOutcome::Success);
        }
        assert_eq!(order, vec!["a.no", "b.no", "a.no", "b.no"]);
    }

    #[test]
    fn test_finished_when_empty() {
        let mut frontier = Frontier::new(&create_test_config());
        assert_eq!(frontier.next(), NextEntry::Finished);
    }

    #[test]
    fn test_per_domain_page_limit() {
        let mut config = create_test_config();
        config.max_pages_per_domain = 1;
        let mut frontier = Frontier::new(&config);
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://a.no/2"));

        ready(&mut frontier);
        frontier.complete("a.no", AttemptOutcome::Success);

        assert_eq!(
            frontier.domain("a.no").unwrap().status,
            DomainStatus::PageLimitReached
        );
        assert_eq!(frontier.next(), NextEntry::Finished);
        assert!(!frontier.push(entry("https://a.no/3")));
    }

    #[test]
    fn test_global_page_limit_counts_in_flight() {
        let mut config = create_test_config();
        config.max_pages = 2;
        let mut frontier = Frontier::new(&config);
        for url in ["https://a.no/1", "https://b.no/1", "https://c.no/1"] {
            frontier.push(entry(url));
        }

        ready(&mut frontier);
        ready(&mut frontier);
        assert_eq!(frontier.next(), NextEntry::Wait);

        frontier.complete("a.no", AttemptOutcome::Success);
        frontier.complete("b.no", AttemptOutcome::Success);
        assert_eq!(frontier.next(), NextEntry::Finished);
        assert_eq!(frontier.pages_crawled(), 2);
    }

    #[test]
    fn test_failures_do_not_count_toward_page_limit() {
        let mut config = create_test_config();
        config.max_pages = 1;
        let mut frontier = Frontier::new(&config);
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://b.no/1"));

        ready(&mut frontier);
        frontier.complete("a.no", AttemptOutcome::Failed);
        assert_eq!(ready(&mut frontier).domain, "b.no");
    }

    #[test]
    fn test_unhealthy_domain_served_last() {
        let mut frontier = Frontier::new(&create_test_config());
        frontier.push(entry("https://bad.no/1"));
        frontier.push(entry("https://bad.no/2"));
        frontier.push(entry("https://bad.no/3"));

        for _ in 0..2 {
            ready(&mut frontier);
            frontier.complete("bad.no", AttemptOutcome::Failed);
        }

        frontier.push(entry("https://good.no/1"));
        assert_eq!(ready(&mut frontier).domain, "good.no");
        frontier.complete("good.no", AttemptOutcome::Success);

        // still served once nothing healthy is left
        assert_eq!(ready(&mut frontier).domain, "bad.no");
    }

    #[test]
    fn test_suspend_drops_queue() {
        let mut frontier = Frontier::new(&create_test_config());
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://a.no/2"));

        assert_eq!(frontier.suspend("a.no"), 2);
        assert_eq!(frontier.next(), NextEntry::Finished);
        assert!(!frontier.push(entry("https://a.no/3")));
    }

    #[test]
    fn test_requeue_goes_to_back() {
        let mut frontier = Frontier::new(&create_test_config());
        frontier.push(entry("https://a.no/1"));
        frontier.push(entry("https://a.no/2"));

        let first = ready(&mut frontier);
        frontier.complete("a.no", AttemptOutcome::Failed);
        assert!(frontier.requeue(first));

        // The failing URL does not block the rest of its domain
        let second = ready(&mut frontier);
        assert_eq!(second.url.as_str(), "https://a.no/2");
        frontier.complete("a.no", AttemptOutcome::Success);

        let retried = ready(&mut frontier);
        assert_eq!(retried.url.as_str(), "https://a.no/1");
        assert_eq!(retried.attempts, 1);
    }
}
