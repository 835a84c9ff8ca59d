//! Adaptive per-domain rate limiting
//!
//! Each domain owns a [`DomainState`]. States live in a sharded concurrent map,
//! so workers touching different domains never contend on one lock.

use crate::config::PolitenessConfig;
use crate::state::DomainState;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Per-domain delay bookkeeping shared by all crawl workers
#[derive(Debug)]
pub struct RateLimiter {
    config: PolitenessConfig,
    domains: DashMap<String, DomainState>,
}

impl RateLimiter {
    pub fn new(config: PolitenessConfig) -> Self {
        Self {
            config,
            domains: DashMap::new(),
        }
    }

    /// Delay to wait before the next request to `domain`
    ///
    /// Unknown domains start at the base delay.
    pub fn delay_for(&self, domain: &str) -> Duration {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config))
            .current_delay
    }

    /// Time still to wait before `domain` may be contacted again
    ///
    /// Zero when the current delay has already elapsed since the last request.
    pub fn remaining_wait(&self, domain: &str, now: Instant) -> Duration {
        let state = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config));
        match state.last_request_time {
            Some(last) => state
                .current_delay
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Notes that a request to `domain` is being sent now
    pub fn record_request(&self, domain: &str) {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config))
            .record_request(Instant::now());
    }

    /// Grows the domain's delay after a throttling signal
    ///
    /// Returns `true` if this signal suspended the domain.
    pub fn record_throttled(&self, domain: &str) -> bool {
        let mut state = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config));
        let newly_suspended = state.record_throttled(&self.config);
        if newly_suspended {
            tracing::warn!(
                "Suspending {} after {} consecutive throttle signals",
                domain,
                state.consecutive_throttles
            );
        } else {
            tracing::debug!(
                "Throttled by {}, delay now {:?}",
                domain,
                state.current_delay
            );
        }
        newly_suspended
    }

    /// Decays the domain's delay after a successful response
    pub fn record_success(&self, domain: &str) {
        if let Some(mut state) = self.domains.get_mut(domain) {
            state.record_success(&self.config);
        }
    }

    /// Raises the domain's delay floor to a robots.txt `Crawl-delay`
    pub fn apply_crawl_delay(&self, domain: &str, crawl_delay: Duration) {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState::new(&self.config))
            .apply_crawl_delay(crawl_delay);
    }

    pub fn is_suspended(&self, domain: &str) -> bool {
        self.domains
            .get(domain)
            .map(|state| state.suspended)
            .unwrap_or(false)
    }

    /// Copy of the current state of a domain
    pub fn snapshot(&self, domain: &str) -> Option<DomainState> {
        self.domains.get(domain).map(|state| state.clone())
    }

    /// Sorted list of suspended domains
    pub fn suspended_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .domains
            .iter()
            .filter(|entry| entry.value().suspended)
            .map(|entry| entry.key().clone())
            .collect();
        domains.sort();
        domains
    }
}
