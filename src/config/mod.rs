pub mod defaults;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::memory::errors::{MemoryError, MemoryResult};
use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Upper bound used as heap total when set, in bytes
    pub max_heap_size: Option<u64>,
    pub gc_threshold_ratio: f64,
    pub pooling_enabled: bool,
    pub caching_enabled: bool,
    pub monitoring_enabled: bool,
    pub sampling_interval_ms: u64,
    pub max_samples: usize,
    pub output_directory: PathBuf,
    pub detailed_stats: bool,
    pub include_samples_in_report: bool,
    pub pool_max_size: usize,
    pub intern_capacity: usize,
    pub leak_window: usize,
    pub gc_pause_warn_ms: u64,
    pub gc_max_per_minute: u32,
    pub aggressive_collection_cycles: u32,
    pub aggressive_cycle_pause_ms: u64,
    pub cache_categories: Vec<CacheCategoryConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheCategoryConfig {
    pub name: String,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl CacheCategoryConfig {
    pub fn new(name: impl Into<String>, max_entries: usize, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_entries,
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl MemoryConfig {
    pub fn default_output_directory() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kg-memory-manager")
            .join("reports")
    }

    /// Load from a TOML file, or fall back to defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config: Self = if let Some(path) = config_path {
            let config_str = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn aggressive_cycle_pause(&self) -> Duration {
        Duration::from_millis(self.aggressive_cycle_pause_ms)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> MemoryResult<()> {
        if self.sampling_interval_ms == 0 {
            return Err(MemoryError::config("Sampling interval must be greater than 0"));
        }

        if self.max_samples == 0 {
            return Err(MemoryError::config("Max samples must be greater than 0"));
        }

        if !(self.gc_threshold_ratio > 0.0 && self.gc_threshold_ratio <= 1.0) {
            return Err(MemoryError::config(format!(
                "GC threshold ratio must be in (0.0, 1.0], got {}",
                self.gc_threshold_ratio
            )));
        }

        if self.leak_window < 2 {
            return Err(MemoryError::config("Leak window must cover at least 2 samples"));
        }

        if self.leak_window > self.max_samples {
            return Err(MemoryError::config(format!(
                "Leak window ({}) must not exceed max samples ({})",
                self.leak_window, self.max_samples
            )));
        }

        if self.max_heap_size == Some(0) {
            return Err(MemoryError::config("Max heap size must be greater than 0 when set"));
        }

        if self.output_directory.as_os_str().is_empty() {
            return Err(MemoryError::config("Output directory must not be empty"));
        }

        let mut names = HashSet::new();
        for category in &self.cache_categories {
            if category.max_entries == 0 {
                return Err(MemoryError::config(format!(
                    "Cache category '{}' must allow at least one entry",
                    category.name
                )));
            }
            if !names.insert(category.name.as_str()) {
                return Err(MemoryError::config(format!(
                    "Duplicate cache category: {}",
                    category.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_heap_size: None,
            gc_threshold_ratio: DEFAULT_GC_THRESHOLD_RATIO,
            pooling_enabled: true,
            caching_enabled: true,
            monitoring_enabled: true,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            max_samples: DEFAULT_MAX_SAMPLES,
            output_directory: Self::default_output_directory(),
            detailed_stats: false,
            include_samples_in_report: false,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            intern_capacity: DEFAULT_INTERN_CAPACITY,
            leak_window: DEFAULT_LEAK_WINDOW,
            gc_pause_warn_ms: DEFAULT_GC_PAUSE_WARN_MS,
            gc_max_per_minute: DEFAULT_GC_MAX_PER_MINUTE,
            aggressive_collection_cycles: DEFAULT_AGGRESSIVE_COLLECTION_CYCLES,
            aggressive_cycle_pause_ms: DEFAULT_AGGRESSIVE_CYCLE_PAUSE_MS,
            cache_categories: DEFAULT_CACHE_CATEGORIES
                .iter()
                .map(|(name, max_entries, ttl_secs)| CacheCategoryConfig {
                    name: name.to_string(),
                    max_entries: *max_entries,
                    ttl_secs: *ttl_secs,
                })
                .collect(),
        }
    }
}
