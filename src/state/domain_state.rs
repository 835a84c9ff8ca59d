use crate::config::PolitenessConfig;
use std::time::{Duration, Instant};

/// Politeness state of one domain during a crawl session
///
/// The delay starts at the configured base, grows geometrically on throttling
/// signals up to the cap and decays back toward the floor on success. The floor
/// is the base delay or the robots.txt `Crawl-delay`, whichever is larger.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Delay to wait before the next request
    pub current_delay: Duration,

    /// Lowest delay the domain may decay to
    pub floor_delay: Duration,

    /// Throttle signals received since the last success
    pub consecutive_throttles: u32,

    /// Throttle signals received in the whole session
    pub total_throttles: u32,

    /// Set once the domain exceeded the consecutive throttle limit
    pub suspended: bool,

    /// Number of requests issued to this domain
    pub request_count: u32,

    /// Timestamp of the last request to this domain
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a domain state sitting at the base delay
    pub fn new(config: &PolitenessConfig) -> Self {
        Self {
            current_delay: config.base_delay(),
            floor_delay: config.base_delay(),
            consecutive_throttles: 0,
            total_throttles: 0,
            suspended: false,
            request_count: 0,
            last_request_time: None,
        }
    }

    /// Multiplies the delay by the backoff factor, capped at the maximum
    ///
    /// Returns `true` if this signal suspended the domain.
    pub fn record_throttled(&mut self, config: &PolitenessConfig) -> bool {
        self.consecutive_throttles += 1;
        self.total_throttles += 1;

        let grown = self.current_delay.mul_f64(config.backoff_factor);
        let cap = config.max_delay().max(self.floor_delay);
        self.current_delay = grown.min(cap).max(self.current_delay);

        if !self.suspended && self.consecutive_throttles > config.max_consecutive_throttles {
            self.suspended = true;
            return true;
        }
        false
    }

    /// Decays the delay toward the floor and clears the throttle streak
    pub fn record_success(&mut self, config: &PolitenessConfig) {
        self.consecutive_throttles = 0;
        self.current_delay = self
            .current_delay
            .mul_f64(config.success_decay)
            .max(self.floor_delay);
    }

    /// Raises the floor to a robots.txt crawl delay
    pub fn apply_crawl_delay(&mut self, crawl_delay: Duration) {
        if crawl_delay > self.floor_delay {
            self.floor_delay = crawl_delay;
        }
        if self.current_delay < self.floor_delay {
            self.current_delay = self.floor_delay;
        }
    }

    /// Records that a request was made to this domain
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }
}
