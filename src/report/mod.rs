pub mod generator;
pub mod recommendations;

pub use generator::{Capabilities, MemoryReport, ReportContext, ReportGrowth};
pub use recommendations::{recommend, Priority, Recommendation, RecommendationInput, RecommendationType};
