//! Document identity and the per-document side data kept by the index

use crate::storage::CrawledPage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Characters of body text kept per document for result snippets
pub const EXCERPT_CHARS: usize = 280;

/// Stable document identifier derived from the normalized URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    /// First eight bytes of the SHA-256 of the URL, big-endian
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        DocId(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Section of a page a term occurrence came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Body,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Description, Field::Body];

    pub fn index(self) -> usize {
        match self {
            Field::Title => 0,
            Field::Description => 1,
            Field::Body => 2,
        }
    }
}

/// Everything the index keeps about one document besides its postings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocId,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Leading body text, cut at a word boundary
    pub excerpt: String,
    /// Indexed tokens across all fields
    pub length: u32,
    pub fetched_at: DateTime<Utc>,
    /// When this version of the page was last indexed; recency decays from here
    pub indexed_at: DateTime<Utc>,
    pub content_hash: String,
    pub outbound_links: Vec<String>,
    /// Distinct terms of the document, used to remove its postings
    pub terms: Vec<String>,
    /// Euclidean norm of the weighted term vector; set by `finalize`
    pub vector_norm: f64,
}

impl DocumentRecord {
    /// Builds the record for a page; `length` and `terms` are filled by the index
    pub fn from_page(page: &CrawledPage, indexed_at: DateTime<Utc>) -> Self {
        Self {
            id: DocId::from_url(&page.url),
            url: page.url.clone(),
            domain: page.domain.clone(),
            title: page.title.clone(),
            description: page.description.clone(),
            excerpt: excerpt(&page.text, EXCERPT_CHARS),
            length: 0,
            fetched_at: page.fetched_at,
            indexed_at,
            content_hash: page.content_hash.clone(),
            outbound_links: page.outbound_links.clone(),
            terms: Vec::new(),
            vector_norm: 0.0,
        }
    }

    /// Title to show in results, falling back to the URL
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.url)
    }

    pub fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.url.capacity()
            + self.domain.capacity()
            + self.title.as_ref().map_or(0, |t| t.capacity())
            + self.description.as_ref().map_or(0, |d| d.capacity())
            + self.excerpt.capacity()
            + self.content_hash.capacity()
            + self
                .outbound_links
                .iter()
                .chain(self.terms.iter())
                .map(|s| s.capacity() + std::mem::size_of::<String>())
                .sum::<usize>()
    }
}

/// First `max_chars` characters of `text` with whitespace collapsed
///
/// Longer text is cut at the last word boundary and marked with an ellipsis.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}
