use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::object_pool::{ManagedPool, Pool, PoolStats};

/// Canonical-string table with oldest-inserted-first eviction.
///
/// No recency tracking: a frequently hit string is still evicted once it
/// becomes the oldest entry.
#[derive(Debug)]
struct Interner {
    entries: HashSet<Arc<str>>,
    order: VecDeque<Arc<str>>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Interner {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashSet::new(),
            order: VecDeque::new(),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn intern(&mut self, value: &str) -> Arc<str> {
        if let Some(existing) = self.entries.get(value) {
            self.hits += 1;
            return Arc::clone(existing);
        }

        self.misses += 1;
        let interned: Arc<str> = Arc::from(value);
        if self.capacity == 0 {
            return interned;
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.evictions += 1;
                }
                None => break,
            }
        }

        self.entries.insert(Arc::clone(&interned));
        self.order.push_back(Arc::clone(&interned));
        interned
    }

    fn trim(&mut self, fraction: f64) -> usize {
        let count = (self.order.len() as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
        for oldest in self.order.drain(..count) {
            self.entries.remove(&oldest);
        }
        count
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InternStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl InternStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Pool of reusable `String` buffers plus the string intern table
pub struct StringPool {
    strings: Arc<Pool<String>>,
    interner: Mutex<Interner>,
}

impl StringPool {
    pub fn new(name: impl Into<String>, max_size: usize, intern_capacity: usize, enabled: bool) -> Self {
        Self {
            strings: Arc::new(Pool::with_enabled(name, max_size, enabled)),
            interner: Mutex::new(Interner::new(intern_capacity)),
        }
    }

    fn table(&self) -> MutexGuard<'_, Interner> {
        self.interner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn acquire(&self, size_hint: usize) -> String {
        self.strings.acquire(size_hint)
    }

    pub fn release(&self, value: String) -> bool {
        self.strings.release(value)
    }

    /// Canonical shared reference for `value`; equal inputs share one allocation
    pub fn intern(&self, value: &str) -> Arc<str> {
        self.table().intern(value)
    }

    pub fn intern_stats(&self) -> InternStats {
        let table = self.table();
        InternStats {
            entries: table.entries.len(),
            capacity: table.capacity,
            hits: table.hits,
            misses: table.misses,
            evictions: table.evictions,
        }
    }
}

impl ManagedPool for StringPool {
    fn name(&self) -> &str {
        self.strings.name()
    }

    /// Trims idle buffers and the intern table by the same fraction
    fn trim(&self, fraction: f64) -> usize {
        let buffers = self.strings.trim(fraction);
        let interned = self.table().trim(fraction);
        buffers + interned
    }

    fn stats(&self) -> PoolStats {
        self.strings.stats()
    }

    fn idle_bytes(&self) -> usize {
        self.strings.idle_bytes()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.strings) as Arc<dyn Any + Send + Sync>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_shared_reference() {
        let pool = StringPool::new("string", 10, 100, true);
        let a = pool.intern("HybridSearchEngine");
        let b = pool.intern(&String::from("HybridSearchEngine"));

        assert!(Arc::ptr_eq(&a, &b));
        let stats = pool.intern_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_intern_evicts_oldest_inserted() {
        let pool = StringPool::new("string", 10, 2, true);
        let first = pool.intern("a");
        pool.intern("b");
        // A hit does not refresh "a"
        pool.intern("a");
        pool.intern("c");

        let stats = pool.intern_stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);

        let again = pool.intern("a");
        assert!(!Arc::ptr_eq(&first, &again), "'a' was evicted and re-interned");
    }

    #[test]
    fn test_trim_covers_buffers_and_table() {
        let pool = StringPool::new("string", 10, 100, true);
        for i in 0..4 {
            pool.release(String::with_capacity(16));
            pool.intern(&format!("symbol_{}", i));
        }

        assert_eq!(ManagedPool::trim(&pool, 0.5), 4);
        assert_eq!(pool.intern_stats().entries, 2);
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn test_zero_capacity_interner_does_not_store() {
        let pool = StringPool::new("string", 10, 0, true);
        let a = pool.intern("x");
        let b = pool.intern("x");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.intern_stats().entries, 0);
    }
}
