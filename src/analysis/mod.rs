//! Pure analysis over captured samples: distribution statistics, growth,
//! the leak heuristic and collector efficiency.

pub mod collector;
pub mod growth;
pub mod leak;
pub mod statistics;

pub use collector::{infer_collections, CollectorAnalysis, CollectorSource, CollectorThresholds, InferredCollection};
pub use growth::{GrowthAnalysis, MetricGrowth};
pub use leak::{detect_leak, LeakAssessment};
pub use statistics::{percentile, MetricStatistics, WindowStatistics};
