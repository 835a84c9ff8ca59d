//! Robots.txt handling module
//!
//! The crawler consults a [`RobotsPolicy`] before every page request. The
//! default [`RobotsCache`] holds parsed rules per domain; the fetcher downloads
//! missing or stale rules through the same rate-limited path as pages and hands
//! them to [`RobotsPolicy::install_rules`].

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use dashmap::DashMap;
use std::time::Duration;

/// Per-domain robots policy consulted by the fetcher
pub trait RobotsPolicy: Send + Sync {
    /// Whether rules for this domain must be fetched before crawling it
    fn needs_rules(&self, _domain: &str) -> bool {
        false
    }

    /// Stores freshly fetched robots.txt content (empty for "no robots.txt")
    fn install_rules(&self, _domain: &str, _content: &str) {}

    /// `Crawl-delay` for our agent, if the domain declares one
    fn crawl_delay(&self, domain: &str) -> Option<Duration>;

    /// Whether `path` on `domain` may be fetched
    fn is_path_allowed(&self, domain: &str, path: &str) -> bool;
}

/// Policy that allows every path and declares no delay
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllRobots;

impl RobotsPolicy for AllowAllRobots {
    fn crawl_delay(&self, _domain: &str) -> Option<Duration> {
        None
    }

    fn is_path_allowed(&self, _domain: &str, _path: &str) -> bool {
        true
    }
}

/// Robots rules cached per domain, matched against one agent token
#[derive(Debug)]
pub struct RobotsCache {
    agent: String,
    rules: DashMap<String, CachedRobots>,
}

impl RobotsCache {
    /// Creates an empty cache matching rules for `agent` (e.g. "RegioBot")
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            rules: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RobotsPolicy for RobotsCache {
    fn needs_rules(&self, domain: &str) -> bool {
        self.rules
            .get(domain)
            .map(|cached| cached.is_stale())
            .unwrap_or(true)
    }

    fn install_rules(&self, domain: &str, content: &str) {
        tracing::debug!("Installed robots.txt for {} ({} bytes)", domain, content.len());
        self.rules.insert(
            domain.to_string(),
            CachedRobots::new(ParsedRobots::from_content(content)),
        );
    }

    fn crawl_delay(&self, domain: &str) -> Option<Duration> {
        self.rules
            .get(domain)
            .and_then(|cached| cached.content.crawl_delay(&self.agent))
    }

    fn is_path_allowed(&self, domain: &str, path: &str) -> bool {
        match self.rules.get(domain) {
            Some(cached) => cached.content.is_allowed(path, &self.agent),
            None => true,
        }
    }
}
