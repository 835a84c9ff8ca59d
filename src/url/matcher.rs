/// Checks if a domain matches a catalog pattern
///
/// `"uio.no"` matches only `uio.no`; `"*.uio.no"` matches `uio.no` itself and any
/// subdomain such as `mn.uio.no`. Both sides are expected in lowercase.
///
/// # Examples
///
/// ```
/// use regio_search::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.uio.no", "uio.no"));
/// assert!(matches_wildcard("*.uio.no", "www.mn.uio.no"));
/// assert!(!matches_wildcard("*.uio.no", "notuio.no"));
/// assert!(!matches_wildcard("uio.no", "mn.uio.no"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}

/// Ranks how specific a pattern is; exact patterns beat wildcards over the same base
pub fn pattern_specificity(pattern: &str) -> usize {
    match pattern.strip_prefix("*.") {
        Some(base) => base.len() * 2,
        None => pattern.len() * 2 + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("nrk.no", "nrk.no"));
        assert!(!matches_wildcard("nrk.no", "tv.nrk.no"));
        assert!(!matches_wildcard("tv.nrk.no", "nrk.no"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.nrk.no", "nrk.no"));
        assert!(matches_wildcard("*.nrk.no", "tv.nrk.no"));
        assert!(matches_wildcard("*.nrk.no", "a.b.nrk.no"));
    }

    #[test]
    fn test_wildcard_rejects_suffix_lookalikes() {
        assert!(!matches_wildcard("*.nrk.no", "mynrk.no"));
        assert!(!matches_wildcard("*.nrk.no", "nrk.no.evil.com"));
        assert!(!matches_wildcard("*.nrk.no", ""));
    }

    #[test]
    fn test_specificity_prefers_exact() {
        assert!(pattern_specificity("tv.nrk.no") > pattern_specificity("*.nrk.no"));
        assert!(pattern_specificity("nrk.no") > pattern_specificity("*.nrk.no"));
        assert!(pattern_specificity("*.tv.nrk.no") > pattern_specificity("nrk.no"));
    }
}
