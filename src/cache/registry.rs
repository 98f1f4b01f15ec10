use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use super::category::{CacheCategory, CacheStats};
use crate::config::CacheCategoryConfig;

/// Named, independent cache categories
pub struct CacheRegistry<V> {
    categories: RwLock<HashMap<String, Arc<CacheCategory<V>>>>,
    enabled: bool,
}

impl<V: Clone> CacheRegistry<V> {
    pub fn new(categories: &[CacheCategoryConfig], enabled: bool) -> Self {
        let map = categories
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    Arc::new(CacheCategory::new(c.name.clone(), c.max_entries, c.ttl())),
                )
            })
            .collect();

        Self {
            categories: RwLock::new(map),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add a category at runtime. Returns false if the name is taken.
    pub fn register_category(&self, name: &str, max_entries: usize, default_ttl: Duration) -> bool {
        let mut categories = self.categories.write().unwrap_or_else(|e| e.into_inner());
        if categories.contains_key(name) {
            return false;
        }
        categories.insert(
            name.to_string(),
            Arc::new(CacheCategory::new(name, max_entries, default_ttl)),
        );
        debug!("Registered cache category '{}' (max {} entries)", name, max_entries);
        true
    }

    pub fn category(&self, name: &str) -> Option<Arc<CacheCategory<V>>> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        categories.get(name).cloned()
    }

    /// Insert into `category`. Unknown categories (or caching disabled) return false.
    pub fn set(&self, category: &str, key: impl Into<String>, value: V, ttl: Option<Duration>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.category(category) {
            Some(cache) => {
                cache.set(key, value, ttl);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, category: &str, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        self.category(category)?.get(key)
    }

    pub fn delete(&self, category: &str, key: &str) -> bool {
        self.category(category).is_some_and(|cache| cache.delete(key))
    }

    pub fn clear(&self, category: &str) -> usize {
        self.category(category).map_or(0, |cache| cache.clear())
    }

    pub fn purge(&self, category: &str) -> usize {
        self.category(category).map_or(0, |cache| cache.purge())
    }

    fn snapshot(&self) -> Vec<Arc<CacheCategory<V>>> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        categories.values().cloned().collect()
    }

    /// Purge expired entries in every category
    pub fn purge_all(&self) -> usize {
        self.snapshot().iter().map(|cache| cache.purge()).sum()
    }

    /// Drop every entry in every category
    pub fn clear_all(&self) -> usize {
        self.snapshot().iter().map(|cache| cache.clear()).sum()
    }

    pub fn categories(&self) -> Vec<String> {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = categories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        let mut stats: Vec<CacheStats> = self.snapshot().iter().map(|cache| cache.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn total_entries(&self) -> usize {
        self.snapshot().iter().map(|cache| cache.len()).sum()
    }
}
