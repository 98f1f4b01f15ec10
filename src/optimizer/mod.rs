pub mod pressure;
pub mod run;

pub use pressure::{PressureMonitor, PressureSettings};
pub use run::{CapabilityStatus, OptimizationRun, PassKind, PassTrigger};
