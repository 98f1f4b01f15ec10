/// Default configuration constants for the KG memory manager

// Sampling defaults
pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_SAMPLES: usize = 1000;
pub const DEFAULT_LEAK_WINDOW: usize = 10;

// Pressure defaults
pub const DEFAULT_GC_THRESHOLD_RATIO: f64 = 0.8;
pub const DEFAULT_AGGRESSIVE_COLLECTION_CYCLES: u32 = 3;
pub const DEFAULT_AGGRESSIVE_CYCLE_PAUSE_MS: u64 = 25;
pub const DEFAULT_TRIM_FRACTION: f64 = 0.5;

// Collector analysis defaults
pub const DEFAULT_GC_PAUSE_WARN_MS: u64 = 100;
pub const DEFAULT_GC_MAX_PER_MINUTE: u32 = 30;
/// Relative heap drop between two samples that counts as an inferred collection.
pub const INFERRED_COLLECTION_DROP_RATIO: f64 = 0.10;

// Pool defaults
pub const DEFAULT_POOL_MAX_SIZE: usize = 100;
pub const DEFAULT_INTERN_CAPACITY: usize = 10_000;

// Built-in pool names
pub const BUFFER_POOL: &str = "buffer";
pub const STRING_POOL: &str = "string";
pub const ARRAY_POOL: &str = "array";

// Report defaults
pub const REPORT_FILE_PREFIX: &str = "memory-report";
pub const OPTIMIZATION_HISTORY_LIMIT: usize = 100;
pub const COLLECTOR_HISTORY_LIMIT: usize = 1000;

/// Event channel capacity for host subscribers
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default cache categories: (name, max entries, ttl seconds)
pub const DEFAULT_CACHE_CATEGORIES: &[(&str, usize, u64)] = &[
    ("node", 5_000, 1800),
    ("embedding", 10_000, 3600),
    ("query", 1_000, 300),
    ("file", 2_000, 600),
];
