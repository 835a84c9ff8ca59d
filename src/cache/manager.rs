//! Bounded cache with pluggable eviction

use crate::config::{CacheConfig, EvictionPolicy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::mem::size_of;
use std::time::{Duration, Instant};
use tracing::trace;

/// Approximate resident size of a cached value
pub trait Weigh {
    fn weight(&self) -> usize;
}

impl Weigh for String {
    fn weight(&self) -> usize {
        size_of::<String>() + self.capacity()
    }
}

impl<T: Weigh> Weigh for Vec<T> {
    fn weight(&self) -> usize {
        size_of::<Vec<T>>() + self.iter().map(Weigh::weight).sum::<usize>()
    }
}

/// Counters reported by [`CacheManager::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before the first lookup
    pub hit_rate: f64,
    pub items: usize,
    pub bytes: usize,
    pub evictions: u64,
    pub expirations: u64,
}

struct Entry<V> {
    value: V,
    bytes: usize,
    inserted: Instant,
    expires_at: Option<Instant>,
    last_access: u64,
    accesses: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    bytes: usize,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> Inner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.bytes -= entry.bytes;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove(&key);
            self.expirations += 1;
        }
    }

    fn victim(&self, policy: EvictionPolicy) -> Option<String> {
        let entries = self.entries.iter();
        let victim = match policy {
            EvictionPolicy::Lru => entries.min_by_key(|(_, e)| e.last_access),
            EvictionPolicy::Lfu => entries.min_by_key(|(_, e)| (e.accesses, e.last_access)),
            EvictionPolicy::Ttl => entries.min_by_key(|(_, e)| (e.expires_at.unwrap_or(e.inserted), e.last_access)),
        };
        victim.map(|(k, _)| k.clone())
    }
}

/// Thread-safe cache bounded by item count and total weight
///
/// A single lock guards the map and its accounting, so a reader never
/// observes an entry whose bytes are not counted or vice versa. Room is made
/// before a new entry is admitted; the limits hold at every point a caller
/// can observe.
pub struct CacheManager<V> {
    policy: EvictionPolicy,
    max_items: usize,
    max_bytes: usize,
    default_ttl: Option<Duration>,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone + Weigh> CacheManager<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.policy, config.max_items, config.max_bytes, config.ttl())
    }

    pub fn with_limits(
        policy: EvictionPolicy,
        max_items: usize,
        max_bytes: usize,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            policy,
            max_items,
            max_bytes,
            default_ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                bytes: 0,
                tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Inserts or replaces an entry
    ///
    /// `ttl` overrides the configured default. Returns `false` when the value
    /// alone is heavier than the whole cache and was not admitted.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> bool {
        self.put_at(key.into(), value, ttl, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            inner.remove(key);
            inner.expirations += 1;
            inner.misses += 1;
            return None;
        }

        let tick = inner.next_tick();
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_access = tick;
        entry.accesses += 1;
        Some(entry.value.clone())
    }

    fn put_at(&self, key: String, value: V, ttl: Option<Duration>, now: Instant) -> bool {
        let bytes = key.len() + value.weight();
        let mut inner = self.inner.lock();
        // A rejected value must not leave the previous one readable
        inner.remove(&key);
        if bytes > self.max_bytes || self.max_items == 0 {
            trace!("Value for '{}' ({} bytes) exceeds cache capacity", key, bytes);
            return false;
        }
        inner.purge_expired(now);

        while inner.entries.len() + 1 > self.max_items || inner.bytes + bytes > self.max_bytes {
            let Some(victim) = inner.victim(self.policy) else {
                break;
            };
            trace!("Evicting '{}' ({:?})", victim, self.policy);
            inner.remove(&victim);
            inner.evictions += 1;
        }

        let tick = inner.next_tick();
        let expires_at = ttl.or(self.default_ttl).map(|ttl| now + ttl);
        inner.entries.insert(
            key,
            Entry {
                value,
                bytes,
                inserted: now,
                expires_at,
                last_access: tick,
                accesses: 0,
            },
        );
        inner.bytes += bytes;
        true
    }

    /// Drops every entry; counters are kept
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            items: inner.entries.len(),
            bytes: inner.bytes,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
