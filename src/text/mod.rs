//! Text tokenization for indexing and querying
//!
//! Pipeline: UAX#29 word boundaries → lowercase → fold diacritics (keeping
//!           æ, ø and å) → filter short/long tokens → remove stopwords
//!           → optional light stemming ([`StemmingTokenizer`])
//!
//! Positions count every word, stopwords included, so the distance between
//! two surviving tokens reflects the original text.

mod stemmer;
mod stopwords;

pub use stemmer::stem;

use unicode_segmentation::UnicodeSegmentation;

/// Shortest token kept, in characters
const MIN_TOKEN_CHARS: usize = 2;

/// Longest token kept, in characters
const MAX_TOKEN_CHARS: usize = 64;

/// A normalized term and its word position in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Language-aware tokenizer used by both the indexer and the query path
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, locale: &str) -> Vec<Token>;

    /// Distinct terms in first-occurrence order
    fn terms(&self, text: &str, locale: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tokenize(text, locale)
            .into_iter()
            .map(|t| t.term)
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

/// Default tokenizer built on Unicode word segmentation
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeTokenizer;

impl Tokenizer for UnicodeTokenizer {
    fn tokenize(&self, text: &str, locale: &str) -> Vec<Token> {
        let stopwords = stopwords::for_locale(locale);

        text.unicode_words()
            .enumerate()
            .filter_map(|(position, word)| {
                let term = normalize_word(word);
                let chars = term.chars().count();
                if !(MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&chars) {
                    return None;
                }
                if stopwords.contains(&term.as_str()) {
                    return None;
                }
                Some(Token {
                    term,
                    position: position as u32,
                })
            })
            .collect()
    }
}

/// Wraps another tokenizer and stems every term it produces
#[derive(Debug, Clone, Copy, Default)]
pub struct StemmingTokenizer<T>(pub T);

impl<T: Tokenizer> Tokenizer for StemmingTokenizer<T> {
    fn tokenize(&self, text: &str, locale: &str) -> Vec<Token> {
        self.0
            .tokenize(text, locale)
            .into_iter()
            .map(|token| Token {
                term: stem(&token.term, locale),
                position: token.position,
            })
            .collect()
    }
}

/// Lowercases, folds diacritics and drops non-alphanumeric characters
pub fn normalize_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Maps accented Latin letters to their base letter
///
/// The Norwegian letters æ, ø and å are distinct letters and stay as they are.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'ā' => 'a',
        'ç' | 'č' | 'ć' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' | 'ś' => 's',
        'ž' | 'ź' | 'ż' => 'z',
        'ł' => 'l',
        other => other,
    }
}
