//! Per-domain result capping

use std::collections::HashMap;

/// Keeps at most `cap` items per domain, preserving order
///
/// Items must already be ranked best first. Capped-out items are dropped,
/// the rest keep their scores and relative order.
pub fn cap_per_domain<'d, T, F>(items: Vec<T>, cap: usize, domain_of: F) -> Vec<T>
where
    F: Fn(&T) -> &'d str,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let count = seen.entry(domain_of(item).to_string()).or_insert(0);
            *count += 1;
            *count <= cap
        })
        .collect()
}
