//! Stopword lists per locale

/// Norwegian (bokmål and nynorsk) stopwords
const NORWEGIAN: &[&str] = &[
    "alle", "at", "av", "bare", "begge", "ble", "blei", "bli", "blir", "blitt", "både", "da", "de",
    "deg", "dei", "deim", "deira", "deires", "dem", "den", "denne", "der", "dere", "deres", "det",
    "dette", "di", "din", "disse", "ditt", "du", "dykk", "dykkar", "eg", "ein", "eit", "eitt",
    "eller", "elles", "en", "enn", "er", "et", "ett", "etter", "for", "fordi", "fra", "før", "ha",
    "hadde", "han", "hans", "har", "hennar", "henne", "hennes", "her", "hjå", "ho", "hoe", "honom",
    "hoss", "hossen", "hun", "hva", "hvem", "hver", "hvilke", "hvilken", "hvis", "hvor", "hvordan",
    "hvorfor", "i", "ikke", "ikkje", "ingen", "ingi", "inkje", "inn", "inni", "ja", "jeg", "kan",
    "kom", "korleis", "korso", "kun", "kunne", "kva", "kvar", "kvarhelst", "kven", "kvi", "kvifor",
    "man", "mange", "me", "med", "medan", "meg", "meget", "mellom", "men", "mi", "min", "mine",
    "mitt", "mot", "mykje", "ned", "no", "noe", "noen", "noka", "noko", "nokon", "nokor", "nokre",
    "nå", "når", "og", "også", "om", "opp", "oss", "over", "på", "samme", "seg", "selv", "si",
    "sia", "sidan", "siden", "sin", "sine", "sitt", "sjøl", "skal", "skulle", "slik", "so", "som",
    "somme", "somt", "så", "sånn", "til", "um", "upp", "ut", "uten", "var", "vart", "varte",
    "ved", "vere", "verte", "vi", "vil", "ville", "vore", "vors", "vort", "vår", "være", "vært",
    "å",
];

/// English stopwords (Lucene's default set)
const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Stopword list for a locale tag such as "nb", "nn", "no" or "en"
///
/// Unknown locales get no stopwords.
pub fn for_locale(locale: &str) -> &'static [&'static str] {
    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match language.as_str() {
        "nb" | "nn" | "no" => NORWEGIAN,
        "en" => ENGLISH,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_lookup() {
        assert!(for_locale("nb").contains(&"og"));
        assert!(for_locale("nn-NO").contains(&"ikkje"));
        assert!(for_locale("en_GB").contains(&"the"));
        assert!(for_locale("de").is_empty());
    }

    #[test]
    fn test_lists_are_lowercase() {
        for word in NORWEGIAN.iter().chain(ENGLISH) {
            assert_eq!(*word, word.to_lowercase());
        }
    }
}
