pub mod allocator;
pub mod probe;
pub mod sampler;
pub mod snapshot;

pub use allocator::{AllocatorStats, TrackingAllocator};
pub use probe::{MemoryProbe, ProbeReading, ProcStatus, ProcessProbe};
pub use sampler::{MemorySampler, SessionData};
pub use snapshot::{DetailedStats, MemorySnapshot, Metric, SampleWindow};
