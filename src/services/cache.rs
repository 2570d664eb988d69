use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A thread-safe cache where every entry carries its own TTL.
///
/// Expired entries are not evicted; they read as missing until a writer
/// replaces them. Each `insert` swaps the whole entry, so readers never see a
/// value paired with another write's timestamp.
pub struct TtlCache<K, V> {
    data: DashMap<K, CacheEntry<V>>,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get a value if it has not outlived its TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        entry.is_fresh(Instant::now()).then(|| entry.value.clone())
    }

    /// Get a value together with the instant it was stored, fresh or not.
    pub fn get_with_age(&self, key: &K) -> Option<(V, Instant)> {
        self.data
            .get(key)
            .map(|entry| (entry.value.clone(), entry.fetched_at))
    }

    /// Store a value stamped with the current time.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, Instant::now(), ttl);
    }

    /// Store a value with an explicit fetch time.
    pub fn insert_at(&self, key: K, value: V, fetched_at: Instant, ttl: Duration) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                fetched_at,
                ttl,
            },
        );
    }

    /// Check if a key exists and is not expired.
    pub fn is_fresh(&self, key: &K) -> bool {
        self.data
            .get(key)
            .map(|entry| entry.is_fresh(Instant::now()))
            .unwrap_or(false)
    }

    /// Number of entries, including expired ones.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
