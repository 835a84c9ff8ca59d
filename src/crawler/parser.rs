//! HTML extraction of text, metadata and links
//!
//! Extraction sits behind the [`HtmlExtractor`] trait so the coordinator does
//! not depend on a particular HTML parser. [`ScraperExtractor`] is the default.

use crate::url::normalize_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Elements whose text is never visible page content
const INVISIBLE_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// How many leading bytes are inspected for binary content
const BINARY_SNIFF_BYTES: usize = 1024;

/// Why a response body could not be turned into a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty document")]
    Empty,

    #[error("document looks binary")]
    Binary,
}

/// Content extracted from one HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// Trimmed `<title>` text
    pub title: Option<String>,

    /// `<meta name="description">` (or `og:description`) content
    pub description: Option<String>,

    /// Visible body text with whitespace collapsed
    pub text: String,

    /// Normalized absolute http(s) links in document order, deduplicated
    pub links: Vec<String>,
}

/// Turns raw HTML into text, metadata and outbound links
pub trait HtmlExtractor: Send + Sync {
    fn extract(&self, raw: &[u8], base_url: &Url) -> Result<ExtractedPage, ParseError>;
}

/// Extractor backed by the `scraper` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperExtractor;

impl HtmlExtractor for ScraperExtractor {
    /// Parses HTML content and extracts text, metadata and links
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:**
    /// - `<a href="...">` tags anywhere in the document
    /// - `<link rel="canonical" href="...">`
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:` links and data URIs
    /// - Fragment-only links
    /// - Anything that does not normalize to an http(s) URL
    fn extract(&self, raw: &[u8], base_url: &Url) -> Result<ExtractedPage, ParseError> {
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::Empty);
        }
        if raw.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0) {
            return Err(ParseError::Binary);
        }

        let html = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&html);

        let title = extract_title(&document);
        let description = extract_description(&document);
        let text = extract_text(&document);
        let links = extract_links(&document, base_url);

        if title.is_none() && text.is_empty() && links.is_empty() {
            return Err(ParseError::Empty);
        }

        Ok(ExtractedPage {
            title,
            description,
            text,
            links,
        })
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    ["meta[name='description']", "meta[property='og:description']"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|element| element.value().attr("content"))
                .map(collapse_whitespace)
                .find(|content| !content.is_empty())
        })
}

/// Collects visible text from `<body>`, skipping script-like elements
fn extract_text(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map(|element| INVISIBLE_ELEMENTS.contains(&element.value().name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(link) = resolve_link(href, base_url) {
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only references
/// - URLs that fail to resolve or normalize
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok().map(String::from)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
