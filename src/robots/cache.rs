//! Robots.txt caching with 24-hour expiry

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// How long fetched rules stay valid
const ROBOTS_TTL_HOURS: i64 = 24;

/// Parsed robots.txt rules plus the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the rules are older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(ROBOTS_TTL_HOURS)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
