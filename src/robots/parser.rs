//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; `Crawl-delay`,
//! which that crate does not expose, is parsed here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt data for one domain
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty means allow all)
    content: String,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// A policy that allows everything; used when robots.txt is missing
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL or path is allowed for the given agent token
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Gets the crawl delay for an agent token
    ///
    /// A group naming the agent wins over the `*` group. The delay applies to
    /// the `User-agent` lines directly preceding it.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let agent = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if !(seconds.is_finite() && seconds >= 0.0) {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(seconds);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        agent_delay = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard_delay = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        agent_delay.or(wildcard_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "RegioBot"));
        assert_eq!(robots.crawl_delay("RegioBot"), None);
    }

    #[test]
    fn test_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed("/", "RegioBot"));
        assert!(robots.is_allowed("/page", "RegioBot"));
        assert!(!robots.is_allowed("/admin", "RegioBot"));
        assert!(!robots.is_allowed("http://a.test:8080/admin/users", "RegioBot"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!robots.is_allowed("/private", "RegioBot"));
        assert!(robots.is_allowed("/private/public", "RegioBot"));
    }

    #[test]
    fn test_specific_user_agent_group() {
        let robots =
            ParsedRobots::from_content("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(robots.is_allowed("/page", "RegioBot"));
        assert!(!robots.is_allowed("/page", "BadBot"));
    }

    #[test]
    fn test_garbage_allows_everything() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("/any/path", "RegioBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("RegioBot"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_specific_agent_wins() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: RegioBot\nCrawl-delay: 2.5",
        );
        assert_eq!(robots.crawl_delay("RegioBot"), Some(Duration::from_millis(2_500)));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_multiple_agents_in_group() {
        let robots = ParsedRobots::from_content("User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3");
        assert_eq!(robots.crawl_delay("BotA"), Some(Duration::from_secs(3)));
        assert_eq!(robots.crawl_delay("BotB"), Some(Duration::from_secs(3)));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_ignores_invalid_values() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: soon\nCrawl-delay: -4");
        assert_eq!(robots.crawl_delay("RegioBot"), None);
    }
}
