pub mod analysis;
pub mod cache;
pub mod config;
pub mod gc;
pub mod http;
pub mod memory;
pub mod monitor;
pub mod optimizer;
pub mod pool;
pub mod report;

// Re-export commonly used types
pub use cache::{CacheCategory, CacheRegistry, CacheStats};
pub use config::{CacheCategoryConfig, MemoryConfig};
pub use gc::{Collector, CollectorEvent, FnCollector, MallocTrimCollector};
pub use memory::{EventBus, MemoryError, MemoryEvent, MemoryResult, MemoryStats, ResourceManager};
pub use monitor::{MemoryProbe, MemorySnapshot, ProcessProbe, TrackingAllocator};
pub use optimizer::{OptimizationRun, PassKind};
pub use pool::{Pool, PoolRegistry, Poolable, PooledObject, StringPool};
pub use report::{MemoryReport, Priority, Recommendation, RecommendationType};
