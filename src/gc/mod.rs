pub mod collector;
pub mod instrumented;

pub use collector::{Collector, FnCollector, MallocTrimCollector};
pub use instrumented::{CollectorEvent, InstrumentedCollector};
