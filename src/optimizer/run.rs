use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Purge expired cache entries, trim pools, one collector cycle
    Normal,
    /// Clear caches, trim pools, several collector cycles
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    Sample,
    CollectorEvent,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Available,
    Unavailable,
}

/// Record of one reclaim pass. Counts only, never object contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: PassKind,
    pub trigger: PassTrigger,
    pub utilization: Option<f64>,
    pub pool_objects_trimmed: usize,
    pub cache_entries_cleared: usize,
    pub collector_cycles_requested: u32,
    pub collector_cycles_performed: u32,
    pub collector: CapabilityStatus,
    pub duration_ms: f64,
}

impl OptimizationRun {
    pub fn new(kind: PassKind, trigger: PassTrigger, utilization: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            trigger,
            utilization,
            pool_objects_trimmed: 0,
            cache_entries_cleared: 0,
            collector_cycles_requested: 0,
            collector_cycles_performed: 0,
            collector: CapabilityStatus::Unavailable,
            duration_ms: 0.0,
        }
    }
}
