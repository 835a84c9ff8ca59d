//! Light suffix stripping for Norwegian and English
//!
//! Norwegian follows the first two steps of the Snowball Norwegian
//! stemmer: inflectional endings are removed only inside R1, the part of
//! the word after the first non-vowel that follows a vowel (at least three
//! letters in). English only folds plurals. Other locales are unchanged.

const NORWEGIAN_VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y', 'æ', 'å', 'ø'];

/// Inflectional endings and their replacements, longest first
const NORWEGIAN_ENDINGS: &[(&str, &str)] = &[
    ("hetenes", ""),
    ("hetene", ""),
    ("hetens", ""),
    ("heten", ""),
    ("endes", ""),
    ("heter", ""),
    ("ande", ""),
    ("ende", ""),
    ("edes", ""),
    ("enes", ""),
    ("erte", "er"),
    ("ede", ""),
    ("ane", ""),
    ("ene", ""),
    ("het", ""),
    ("ens", ""),
    ("ers", ""),
    ("ets", ""),
    ("ast", ""),
    ("ert", "er"),
    ("en", ""),
    ("ar", ""),
    ("er", ""),
    ("as", ""),
    ("es", ""),
    ("et", ""),
    ("a", ""),
    ("e", ""),
];

/// Letters after which a final `s` is an ending; `k` only after a non-vowel
const S_ENDING_LETTERS: &[char] = &[
    'b', 'c', 'd', 'f', 'g', 'h', 'j', 'l', 'm', 'n', 'o', 'p', 'r', 't', 'v', 'y', 'z',
];

/// Stems one normalized term for the given locale
pub fn stem(term: &str, locale: &str) -> String {
    match locale {
        "nb" | "nn" | "no" => stem_norwegian(term),
        "en" => stem_english(term),
        _ => term.to_string(),
    }
}

fn is_vowel(c: char) -> bool {
    NORWEGIAN_VOWELS.contains(&c)
}

/// Char index where R1 begins, or the word length if it has none
fn r1_start(chars: &[char]) -> usize {
    let start = chars
        .windows(2)
        .position(|pair| is_vowel(pair[0]) && !is_vowel(pair[1]))
        .map(|i| i + 2)
        .unwrap_or(chars.len());
    start.max(3).min(chars.len())
}

fn stem_norwegian(term: &str) -> String {
    let mut chars: Vec<char> = term.chars().collect();
    let r1 = r1_start(&chars);

    // Step 1: the longest ending that lies inside R1
    if let Some((ending, replacement)) = NORWEGIAN_ENDINGS
        .iter()
        .find(|(ending, _)| ends_in_region(&chars, ending, r1))
    {
        chars.truncate(chars.len() - ending.chars().count());
        chars.extend(replacement.chars());
    } else if ends_in_region(&chars, "s", r1) && has_s_ending(&chars) {
        chars.pop();
    }

    // Step 2: "dt" and "vt" lose the t
    if ends_in_region(&chars, "dt", r1) || ends_in_region(&chars, "vt", r1) {
        chars.pop();
    }

    chars.into_iter().collect()
}

fn ends_in_region(chars: &[char], ending: &str, region_start: usize) -> bool {
    let ending: Vec<char> = ending.chars().collect();
    chars.len() >= region_start + ending.len() && chars.ends_with(&ending)
}

fn has_s_ending(chars: &[char]) -> bool {
    match chars.len().checked_sub(2).map(|i| chars[i]) {
        Some('k') => chars.len() >= 3 && !is_vowel(chars[chars.len() - 3]),
        Some(c) => S_ENDING_LETTERS.contains(&c),
        None => false,
    }
}

fn stem_english(term: &str) -> String {
    if term.len() > 4 && term.ends_with("ies") && !term.ends_with("eies") && !term.ends_with("aies") {
        return format!("{}y", &term[..term.len() - 3]);
    }
    if term.len() > 3
        && term.ends_with('s')
        && !term.ends_with("ss")
        && !term.ends_with("us")
        && !term.ends_with("is")
    {
        return term[..term.len() - 1].to_string();
    }
    term.to_string()
}
