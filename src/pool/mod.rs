pub mod object_pool;
pub mod registry;
pub mod string_pool;

pub use object_pool::{ManagedPool, Pool, PoolStats, Poolable, PooledObject};
pub use registry::PoolRegistry;
pub use string_pool::{InternStats, StringPool};
