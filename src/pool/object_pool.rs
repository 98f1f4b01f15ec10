use serde::Serialize;
use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Fixed-shape reuse contract for pooled values.
///
/// `reset` must leave the value in the same observable state as a freshly
/// allocated one (apart from retained capacity).
pub trait Poolable: Send + 'static {
    fn allocate(size_hint: usize) -> Self;

    fn capacity(&self) -> usize;

    fn reset(&mut self);

    /// Approximate heap bytes retained while idle in a pool
    fn retained_bytes(&self) -> usize {
        self.capacity()
    }
}

impl<T> Poolable for Vec<T>
where
    T: Copy + Default + Send + 'static,
{
    fn allocate(size_hint: usize) -> Self {
        Vec::with_capacity(size_hint)
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn reset(&mut self) {
        // Zero the old contents before truncating so nothing stale stays in the allocation
        self.fill(T::default());
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        Vec::capacity(self) * std::mem::size_of::<T>()
    }
}

impl Poolable for String {
    fn allocate(size_hint: usize) -> Self {
        String::with_capacity(size_hint)
    }

    fn capacity(&self) -> usize {
        String::capacity(self)
    }

    fn reset(&mut self) {
        self.clear();
    }
}

/// Wrapper for pooling structurally uniform objects that reset to `Default`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PooledObject<T>(pub T);

impl<T> Poolable for PooledObject<T>
where
    T: Default + Send + 'static,
{
    fn allocate(_size_hint: usize) -> Self {
        PooledObject(T::default())
    }

    fn capacity(&self) -> usize {
        0
    }

    fn reset(&mut self) {
        self.0 = T::default();
    }

    fn retained_bytes(&self) -> usize {
        std::mem::size_of::<T>()
    }
}

impl<T> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub idle: usize,
    pub max_size: usize,
    pub created: u64,
    pub reused: u64,
    pub released: u64,
    pub discarded: u64,
    pub trimmed: u64,
    pub idle_bytes: usize,
}

impl PoolStats {
    pub fn reuse_rate(&self) -> f64 {
        let total = self.created + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    trimmed: AtomicU64,
}

/// Bounded store of reusable instances of one kind
pub struct Pool<T: Poolable> {
    name: String,
    free: Mutex<Vec<T>>,
    max_size: usize,
    enabled: bool,
    counters: PoolCounters,
}

impl<T: Poolable> Pool<T> {
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self::with_enabled(name, max_size, true)
    }

    /// A disabled pool still counts allocations but never retains anything
    pub fn with_enabled(name: impl Into<String>, max_size: usize, enabled: bool) -> Self {
        Self {
            name: name.into(),
            free: Mutex::new(Vec::with_capacity(max_size.min(16))),
            max_size,
            enabled,
            counters: PoolCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn free_list(&self) -> MutexGuard<'_, Vec<T>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle instance with capacity of at least `size_hint`, or allocate a fresh one
    pub fn acquire(&self, size_hint: usize) -> T {
        if self.enabled {
            let mut free = self.free_list();
            if let Some(index) = free.iter().position(|item| item.capacity() >= size_hint) {
                // Keep the free list in release order for oldest-first trimming
                let item = free.remove(index);
                drop(free);
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                return item;
            }
        }

        self.counters.created.fetch_add(1, Ordering::Relaxed);
        T::allocate(size_hint)
    }

    /// Reset and return an instance. Returns whether the pool kept it.
    pub fn release(&self, mut item: T) -> bool {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        if !self.enabled {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        item.reset();
        let mut free = self.free_list();
        if free.len() < self.max_size {
            free.push(item);
            true
        } else {
            drop(free);
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Drop `fraction` of the idle instances, oldest first. Returns how many were removed.
    pub fn trim(&self, fraction: f64) -> usize {
        let fraction = fraction.clamp(0.0, 1.0);
        let removed: Vec<T> = {
            let mut free = self.free_list();
            let count = (free.len() as f64 * fraction).floor() as usize;
            free.drain(..count).collect()
        };

        let count = removed.len();
        if count > 0 {
            self.counters.trimmed.fetch_add(count as u64, Ordering::Relaxed);
            debug!("Trimmed {} idle objects from pool '{}'", count, self.name);
        }
        count
    }

    pub fn clear(&self) -> usize {
        self.trim(1.0)
    }

    pub fn idle(&self) -> usize {
        self.free_list().len()
    }

    pub fn idle_bytes(&self) -> usize {
        self.free_list().iter().map(Poolable::retained_bytes).sum()
    }

    pub fn stats(&self) -> PoolStats {
        let (idle, idle_bytes) = {
            let free = self.free_list();
            (free.len(), free.iter().map(Poolable::retained_bytes).sum())
        };

        PoolStats {
            name: self.name.clone(),
            idle,
            max_size: self.max_size,
            created: self.counters.created.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            trimmed: self.counters.trimmed.load(Ordering::Relaxed),
            idle_bytes,
        }
    }
}

/// Type-erased view of a pool, used by the registry and the optimizer
pub trait ManagedPool: Send + Sync {
    fn name(&self) -> &str;

    fn trim(&self, fraction: f64) -> usize;

    fn stats(&self) -> PoolStats;

    fn idle_bytes(&self) -> usize;

    /// The concrete `Pool<T>` used for typed lookups
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Poolable> ManagedPool for Pool<T> {
    fn name(&self) -> &str {
        Pool::name(self)
    }

    fn trim(&self, fraction: f64) -> usize {
        Pool::trim(self, fraction)
    }

    fn stats(&self) -> PoolStats {
        Pool::stats(self)
    }

    fn idle_bytes(&self) -> usize {
        Pool::idle_bytes(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
