use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
    pub max_entries: usize,
    pub default_ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// One bounded LRU cache with per-entry TTL
pub struct CacheCategory<V> {
    name: String,
    max_entries: usize,
    default_ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    counters: CacheCounters,
}

impl<V: Clone> CacheCategory<V> {
    /// `max_entries` of zero is bumped to one; config validation rejects it earlier
    pub fn new(name: impl Into<String>, max_entries: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            max_entries: capacity.get(),
            default_ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            counters: CacheCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite; a full cache evicts its least-recently-used entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
        };

        let evicted = {
            let mut cache = self.cache();
            match cache.push(key.clone(), entry) {
                Some((evicted_key, _)) if evicted_key != key => Some(evicted_key),
                _ => None,
            }
        };

        if let Some(evicted_key) = evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Cache '{}' evicted LRU key: {}", self.name, evicted_key);
        }
    }

    /// Live value for `key`, refreshing its recency. Expired entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut cache = self.cache();

        match cache.peek(key).map(|entry| entry.is_expired(now)) {
            None => {
                drop(cache);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(true) => {
                cache.pop(key);
                drop(cache);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(false) => {
                let value = cache.get(key).map(|entry| entry.value.clone());
                drop(cache);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                value
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.cache().peek(key).is_some_and(|entry| !entry.is_expired(now))
    }

    /// Age of a live entry, without touching recency
    pub fn age(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.cache()
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| now.duration_since(entry.created_at))
    }

    pub fn delete(&self, key: &str) -> bool {
        self.cache().pop(key).is_some()
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut cache = self.cache();
        let count = cache.len();
        cache.clear();
        count
    }

    /// Remove only expired entries, leaving live ones untouched
    pub fn purge(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.cache();
        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            cache.pop(key.as_str());
        }
        drop(cache);

        if !expired.is_empty() {
            self.counters
                .expirations
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
        }
        expired.len()
    }

    /// Entry count, including expired entries not yet removed
    pub fn len(&self) -> usize {
        self.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            entries: self.len(),
            max_entries: self.max_entries,
            default_ttl_secs: self.default_ttl.as_secs(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_eviction_order() {
        let cache: CacheCategory<u32> = CacheCategory::new("query", 2, Duration::from_secs(60));
        cache.set("A", 1, None);
        cache.set("B", 2, None);
        cache.set("C", 3, None);

        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.get("B"), Some(2));
        assert_eq!(cache.get("C"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache: CacheCategory<u32> = CacheCategory::new("query", 2, Duration::from_secs(60));
        cache.set("A", 1, None);
        cache.set("B", 2, None);
        assert_eq!(cache.get("A"), Some(1));
        cache.set("C", 3, None);

        assert!(cache.contains("A"));
        assert!(!cache.contains("B"));
    }

    #[test]
    fn test_overwrite_is_not_eviction() {
        let cache: CacheCategory<&'static str> = CacheCategory::new("node", 2, Duration::from_secs(60));
        cache.set("k", "old", None);
        cache.set("k", "new", None);

        assert_eq!(cache.get("k"), Some("new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_bound_holds_for_many_sets() {
        let cache: CacheCategory<usize> = CacheCategory::new("file", 16, Duration::from_secs(60));
        for i in 0..1000 {
            cache.set(format!("key_{}", i % 97), i, None);
            assert!(cache.len() <= 16);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_on_access() {
        let cache: CacheCategory<u32> = CacheCategory::new("embedding", 10, Duration::from_secs(60));
        cache.set("short", 1, Some(Duration::from_secs(1)));
        cache.set("long", 2, None);
        assert_eq!(cache.get("short"), Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.len(), 1, "expired entry removed on access");
        assert_eq!(cache.get("long"), Some(2));

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_only_removes_expired() {
        let cache: CacheCategory<u32> = CacheCategory::new("query", 10, Duration::from_secs(60));
        cache.set("a", 1, Some(Duration::from_secs(1)));
        cache.set("b", 2, Some(Duration::from_secs(1)));
        cache.set("c", 3, None);

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.age("c"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache: CacheCategory<u32> = CacheCategory::new("node", 10, Duration::from_secs(60));
        cache.set("a", 1, None);
        cache.set("b", 2, None);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }
}
