use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::object_pool::{ManagedPool, Pool, PoolStats, Poolable};
use super::string_pool::{InternStats, StringPool};
use crate::config::defaults::{ARRAY_POOL, BUFFER_POOL, STRING_POOL};
use crate::config::MemoryConfig;
use crate::memory::errors::{MemoryError, MemoryResult};

/// Named pools, looked up by name and value type
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, Arc<dyn ManagedPool>>>,
    strings: Arc<StringPool>,
    buffers: Arc<Pool<Vec<u8>>>,
    default_max_size: usize,
    enabled: bool,
}

impl PoolRegistry {
    /// Registry with the built-in `buffer`, `string` and `array` pools
    pub fn new(config: &MemoryConfig) -> Self {
        let enabled = config.pooling_enabled;
        let max_size = config.pool_max_size;

        let buffers: Arc<Pool<Vec<u8>>> = Arc::new(Pool::with_enabled(BUFFER_POOL, max_size, enabled));
        let strings = Arc::new(StringPool::new(STRING_POOL, max_size, config.intern_capacity, enabled));
        let arrays: Arc<Pool<Vec<f32>>> = Arc::new(Pool::with_enabled(ARRAY_POOL, max_size, enabled));

        let mut pools: HashMap<String, Arc<dyn ManagedPool>> = HashMap::new();
        pools.insert(BUFFER_POOL.to_string(), buffers.clone());
        pools.insert(STRING_POOL.to_string(), strings.clone());
        pools.insert(ARRAY_POOL.to_string(), arrays);

        Self {
            pools: RwLock::new(pools),
            strings,
            buffers,
            default_max_size: max_size,
            enabled,
        }
    }

    /// Register a pool for a host type. Re-registering the same name and type returns the existing pool.
    pub fn register_pool<T: Poolable>(&self, name: &str, max_size: Option<usize>) -> MemoryResult<Arc<Pool<T>>> {
        let mut pools = self.pools.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = pools.get(name) {
            return Arc::clone(existing)
                .as_any()
                .downcast::<Pool<T>>()
                .map_err(|_| MemoryError::PoolTypeMismatch {
                    name: name.to_string(),
                    requested: std::any::type_name::<T>(),
                });
        }

        let pool = Arc::new(Pool::<T>::with_enabled(
            name,
            max_size.unwrap_or(self.default_max_size),
            self.enabled,
        ));
        pools.insert(name.to_string(), pool.clone());
        debug!("Registered pool '{}' ({})", name, std::any::type_name::<T>());
        Ok(pool)
    }

    /// Typed handle to a named pool
    pub fn pool<T: Poolable>(&self, name: &str) -> MemoryResult<Arc<Pool<T>>> {
        let managed = {
            let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
            pools
                .get(name)
                .cloned()
                .ok_or_else(|| MemoryError::UnknownPool { name: name.to_string() })?
        };

        managed
            .as_any()
            .downcast::<Pool<T>>()
            .map_err(|_| MemoryError::PoolTypeMismatch {
                name: name.to_string(),
                requested: std::any::type_name::<T>(),
            })
    }

    pub fn acquire<T: Poolable>(&self, name: &str, size_hint: usize) -> MemoryResult<T> {
        Ok(self.pool::<T>(name)?.acquire(size_hint))
    }

    pub fn release<T: Poolable>(&self, name: &str, value: T) -> MemoryResult<bool> {
        Ok(self.pool::<T>(name)?.release(value))
    }

    pub fn buffers(&self) -> &Arc<Pool<Vec<u8>>> {
        &self.buffers
    }

    pub fn strings(&self) -> &Arc<StringPool> {
        &self.strings
    }

    pub fn intern(&self, value: &str) -> Arc<str> {
        self.strings.intern(value)
    }

    pub fn intern_stats(&self) -> InternStats {
        self.strings.intern_stats()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ManagedPool>> {
        let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
        pools.values().cloned().collect()
    }

    /// Trim every pool; pools are trimmed one at a time, never locked together
    pub fn trim_all(&self, fraction: f64) -> usize {
        self.snapshot().iter().map(|pool| pool.trim(fraction)).sum()
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        let mut stats: Vec<PoolStats> = self.snapshot().iter().map(|pool| pool.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Idle bytes held by the byte-buffer pool
    pub fn buffer_bytes(&self) -> u64 {
        self.buffers.idle_bytes() as u64
    }

    pub fn names(&self) -> Vec<String> {
        let pools = self.pools.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = pools.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PooledObject;

    fn registry() -> PoolRegistry {
        PoolRegistry::new(&MemoryConfig {
            pool_max_size: 4,
            ..Default::default()
        })
    }

    #[test]
    fn test_builtin_pools_are_typed() -> MemoryResult<()> {
        let registry = registry();
        assert_eq!(registry.names(), vec!["array", "buffer", "string"]);

        let buf: Vec<u8> = registry.acquire(BUFFER_POOL, 128)?;
        assert!(buf.capacity() >= 128);
        assert!(registry.release(BUFFER_POOL, buf)?);
        assert!(registry.buffer_bytes() >= 128);

        let s: String = registry.acquire(STRING_POOL, 8)?;
        registry.release(STRING_POOL, s)?;

        let v: Vec<f32> = registry.acquire(ARRAY_POOL, 768)?;
        registry.release(ARRAY_POOL, v)?;
        Ok(())
    }

    #[test]
    fn test_unknown_pool_and_type_mismatch() {
        let registry = registry();
        assert!(matches!(
            registry.acquire::<Vec<u8>>("missing", 0),
            Err(MemoryError::UnknownPool { .. })
        ));
        assert!(matches!(
            registry.acquire::<String>(BUFFER_POOL, 0),
            Err(MemoryError::PoolTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_register_custom_pool() -> MemoryResult<()> {
        let registry = registry();
        let pool = registry.register_pool::<PooledObject<Vec<String>>>("token_lists", Some(2))?;
        assert_eq!(pool.max_size(), 2);

        let again = registry.register_pool::<PooledObject<Vec<String>>>("token_lists", None)?;
        assert!(Arc::ptr_eq(&pool, &again));

        assert!(registry.register_pool::<String>("token_lists", None).is_err());
        Ok(())
    }

    #[test]
    fn test_trim_all() -> MemoryResult<()> {
        let registry = registry();
        for _ in 0..4 {
            registry.release(BUFFER_POOL, Vec::<u8>::with_capacity(16))?;
            registry.release(ARRAY_POOL, Vec::<f32>::with_capacity(16))?;
        }

        assert_eq!(registry.trim_all(0.5), 4);
        let idle: usize = registry.stats().iter().map(|s| s.idle).sum();
        assert_eq!(idle, 4);
        Ok(())
    }
}
