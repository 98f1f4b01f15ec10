pub mod errors;
pub mod events;
pub mod manager;

pub use errors::{MemoryError, MemoryResult};
pub use events::{EventBus, MemoryEvent};
pub use manager::{shutdown_signal, CollectorSummary, MemoryStats, ResourceManager};
