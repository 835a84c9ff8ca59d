//! Inverted index with explicit term and document frequency bookkeeping
//!
//! Layout: term → posting list → document id → posting (per-field counts and
//! positions). Every mutation goes through [`InvertedIndex::add_document`] or
//! [`InvertedIndex::remove_document`], which keep document and collection
//! frequencies equal to what the posting lists contain.

use super::document::{DocId, DocumentRecord, Field};
use super::{IndexError, IndexResult};
use crate::storage::BatchId;
use crate::text::{Token, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::mem::size_of;

/// Occurrences in the title count this many times in the weighted frequency
pub const TITLE_BOOST: f64 = 3.0;

/// Occurrences in the meta description count this many times
pub const DESCRIPTION_BOOST: f64 = 2.0;

/// Approximate per-entry overhead of a B-tree map node slot
const BTREE_ENTRY_OVERHEAD: usize = 2 * size_of::<usize>();

/// Occurrences of one term in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Occurrence counts indexed by [`Field::index`]
    pub field_counts: [u32; 3],
    /// Word positions across the whole document, ascending
    pub positions: Vec<u32>,
}

impl Posting {
    /// Raw term frequency: occurrences across all fields
    pub fn tf(&self) -> u32 {
        self.field_counts.iter().sum()
    }

    pub fn count(&self, field: Field) -> u32 {
        self.field_counts[field.index()]
    }

    /// Frequency with title and description occurrences boosted
    pub fn weighted_tf(&self) -> f64 {
        self.count(Field::Title) as f64 * TITLE_BOOST
            + self.count(Field::Description) as f64 * DESCRIPTION_BOOST
            + self.count(Field::Body) as f64
    }

    /// Sublinear term weight used in document vectors: 1 + ln(weighted tf)
    pub fn term_weight(&self) -> f64 {
        let wtf = self.weighted_tf();
        if wtf > 0.0 {
            1.0 + wtf.ln()
        } else {
            0.0
        }
    }

    fn estimated_bytes(&self) -> usize {
        size_of::<DocId>()
            + size_of::<Self>()
            + self.positions.capacity() * size_of::<u32>()
            + BTREE_ENTRY_OVERHEAD
    }
}

/// All postings of one term plus its frequency statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    /// Distinct documents containing the term
    pub document_frequency: u32,
    /// Occurrences across all documents
    pub collection_frequency: u64,
    pub postings: BTreeMap<DocId, Posting>,
}

impl PostingList {
    pub fn get(&self, id: DocId) -> Option<&Posting> {
        self.postings.get(&id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.keys().copied()
    }
}

/// Tokens of a document split by field, positions already offset so that
/// description follows title and body follows description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentTokens {
    pub title: Vec<Token>,
    pub description: Vec<Token>,
    pub body: Vec<Token>,
}

impl DocumentTokens {
    pub fn tokenize(
        tokenizer: &dyn Tokenizer,
        title: Option<&str>,
        description: Option<&str>,
        body: &str,
        locale: &str,
    ) -> Self {
        let title = title.map_or_else(Vec::new, |t| tokenizer.tokenize(t, locale));
        let mut offset = next_position(&title);

        let mut description = description.map_or_else(Vec::new, |d| tokenizer.tokenize(d, locale));
        shift(&mut description, offset);
        offset = next_position(&description).max(offset);

        let mut body = tokenizer.tokenize(body, locale);
        shift(&mut body, offset);

        Self {
            title,
            description,
            body,
        }
    }

    pub fn len(&self) -> usize {
        self.title.len() + self.description.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = (Field, &Token)> {
        self.title
            .iter()
            .map(|t| (Field::Title, t))
            .chain(self.description.iter().map(|t| (Field::Description, t)))
            .chain(self.body.iter().map(|t| (Field::Body, t)))
    }
}

fn next_position(tokens: &[Token]) -> u32 {
    tokens.last().map_or(0, |t| t.position + 1)
}

fn shift(tokens: &mut [Token], offset: u32) {
    for token in tokens {
        token.position += offset;
    }
}

/// The searchable index: posting lists, document records and batch tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    terms: BTreeMap<String, PostingList>,
    documents: BTreeMap<DocId, DocumentRecord>,
    processed_batches: BTreeSet<BatchId>,
    total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document, replacing any earlier version with the same id
    ///
    /// Returns `true` when an earlier version was replaced.
    pub fn add_document(&mut self, mut record: DocumentRecord, tokens: &DocumentTokens) -> bool {
        let id = record.id;
        let replaced = self.remove_document(id).is_some();

        let mut local: HashMap<&str, Posting> = HashMap::new();
        for (field, token) in tokens.iter() {
            let posting = local.entry(token.term.as_str()).or_default();
            posting.field_counts[field.index()] += 1;
            posting.positions.push(token.position);
        }

        let mut terms: Vec<String> = Vec::with_capacity(local.len());
        for (term, mut posting) in local {
            posting.positions.sort_unstable();
            let list = self.terms.entry(term.to_string()).or_default();
            list.document_frequency += 1;
            list.collection_frequency += u64::from(posting.tf());
            list.postings.insert(id, posting);
            terms.push(term.to_string());
        }
        terms.sort_unstable();

        record.length = tokens.len() as u32;
        record.terms = terms;
        record.vector_norm = 0.0;
        self.total_tokens += u64::from(record.length);
        self.documents.insert(id, record);

        replaced
    }

    /// Removes a document and all its postings
    pub fn remove_document(&mut self, id: DocId) -> Option<DocumentRecord> {
        let record = self.documents.remove(&id)?;
        for term in &record.terms {
            let Some(list) = self.terms.get_mut(term) else {
                continue;
            };
            if let Some(posting) = list.postings.remove(&id) {
                list.document_frequency = list.document_frequency.saturating_sub(1);
                list.collection_frequency = list
                    .collection_frequency
                    .saturating_sub(u64::from(posting.tf()));
            }
            if list.postings.is_empty() {
                self.terms.remove(term);
            }
        }
        self.total_tokens = self.total_tokens.saturating_sub(u64::from(record.length));
        Some(record)
    }

    pub fn lookup(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.terms.get(term).map_or(0, |l| l.document_frequency)
    }

    pub fn collection_frequency(&self, term: &str) -> u64 {
        self.terms.get(term).map_or(0, |l| l.collection_frequency)
    }

    /// ln(N / df) with df floored at 1; zero for an empty index
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.documents.len();
        if n == 0 {
            return 0.0;
        }
        let df = self.document_frequency(term).max(1);
        (n as f64 / df as f64).ln().max(0.0)
    }

    pub fn document(&self, id: DocId) -> Option<&DocumentRecord> {
        self.documents.get(&id)
    }

    pub fn contains_document(&self, id: DocId) -> bool {
        self.documents.contains_key(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn posting_count(&self) -> usize {
        self.terms.values().map(|l| l.postings.len()).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Documents containing at least one of `terms`, ascending by id
    pub fn candidates(&self, terms: &[String]) -> Vec<DocId> {
        let ids: BTreeSet<DocId> = terms
            .iter()
            .filter_map(|t| self.terms.get(t))
            .flat_map(|l| l.doc_ids())
            .collect();
        ids.into_iter().collect()
    }

    pub fn is_batch_processed(&self, batch_id: BatchId) -> bool {
        self.processed_batches.contains(&batch_id)
    }

    /// Records a batch as indexed; `false` if it already was
    pub fn mark_batch_processed(&mut self, batch_id: BatchId) -> bool {
        self.processed_batches.insert(batch_id)
    }

    pub fn processed_batches(&self) -> &BTreeSet<BatchId> {
        &self.processed_batches
    }

    /// Recomputes every document's vector norm from the current statistics
    ///
    /// Must run after the last mutation and before ranking, since norms
    /// depend on the collection-wide IDF.
    pub fn finalize(&mut self) {
        let mut sums: HashMap<DocId, f64> = HashMap::with_capacity(self.documents.len());
        for (term, list) in &self.terms {
            let idf = self.idf(term);
            for (id, posting) in &list.postings {
                let w = posting.term_weight() * idf;
                *sums.entry(*id).or_insert(0.0) += w * w;
            }
        }
        for (id, record) in self.documents.iter_mut() {
            record.vector_norm = sums.get(id).copied().unwrap_or(0.0).sqrt();
        }
    }

    /// Releases spare capacity in posting position vectors
    pub fn shrink_to_fit(&mut self) {
        for list in self.terms.values_mut() {
            for posting in list.postings.values_mut() {
                posting.positions.shrink_to_fit();
            }
        }
        for record in self.documents.values_mut() {
            record.terms.shrink_to_fit();
            record.outbound_links.shrink_to_fit();
        }
    }

    /// Heap estimate covering term keys, every posting and its positions, and
    /// document records
    pub fn estimate_memory_bytes(&self) -> usize {
        let terms: usize = self
            .terms
            .iter()
            .map(|(term, list)| {
                size_of::<String>()
                    + term.capacity()
                    + size_of::<PostingList>()
                    + BTREE_ENTRY_OVERHEAD
                    + list
                        .postings
                        .values()
                        .map(Posting::estimated_bytes)
                        .sum::<usize>()
            })
            .sum();

        let documents: usize = self
            .documents
            .values()
            .map(|r| size_of::<DocId>() + BTREE_ENTRY_OVERHEAD + r.estimated_bytes())
            .sum();

        let batches = self.processed_batches.len() * (size_of::<BatchId>() + BTREE_ENTRY_OVERHEAD);

        size_of::<Self>() + terms + documents + batches
    }

    /// Checks that frequencies, postings and document records agree
    pub fn verify_consistency(&self) -> IndexResult<()> {
        for (term, list) in &self.terms {
            if list.postings.is_empty() {
                return Err(corrupt(format!("term '{}' has no postings", term)));
            }
            if list.document_frequency as usize != list.postings.len() {
                return Err(corrupt(format!(
                    "term '{}' has df {} but {} postings",
                    term,
                    list.document_frequency,
                    list.postings.len()
                )));
            }
            let cf: u64 = list.postings.values().map(|p| u64::from(p.tf())).sum();
            if cf != list.collection_frequency {
                return Err(corrupt(format!(
                    "term '{}' has cf {} but postings sum to {}",
                    term, list.collection_frequency, cf
                )));
            }
            for id in list.postings.keys() {
                let known = self
                    .documents
                    .get(id)
                    .is_some_and(|r| r.terms.binary_search(term).is_ok());
                if !known {
                    return Err(corrupt(format!(
                        "term '{}' points at unknown document {}",
                        term, id
                    )));
                }
            }
        }

        let mut total = 0u64;
        for (id, record) in &self.documents {
            if record.id != *id {
                return Err(corrupt(format!("document {} stored under {}", record.id, id)));
            }
            for term in &record.terms {
                let posted = self
                    .terms
                    .get(term)
                    .is_some_and(|l| l.postings.contains_key(id));
                if !posted {
                    return Err(corrupt(format!(
                        "document {} lists term '{}' without a posting",
                        id, term
                    )));
                }
            }
            total += u64::from(record.length);
        }
        if total != self.total_tokens {
            return Err(corrupt(format!(
                "token total {} does not match document lengths {}",
                self.total_tokens, total
            )));
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn terms_mut(&mut self) -> &mut BTreeMap<String, PostingList> {
        &mut self.terms
    }
}

fn corrupt(message: String) -> IndexError {
    IndexError::Corrupt(message)
}
