pub mod category;
pub mod registry;

pub use category::{CacheCategory, CacheStats};
pub use registry::CacheRegistry;
