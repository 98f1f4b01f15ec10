use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::monitor::{MemorySnapshot, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricGrowth {
    pub start: u64,
    pub end: u64,
    pub absolute: i64,
    /// Relative change in percent; `None` when the start value is zero
    pub percent: Option<f64>,
    /// Bytes per second; `None` when no time elapsed
    pub rate_per_sec: Option<f64>,
}

impl MetricGrowth {
    pub fn compute(start: u64, end: u64, elapsed_secs: f64) -> Self {
        let absolute = end as i64 - start as i64;
        Self {
            start,
            end,
            absolute,
            percent: (start > 0).then(|| absolute as f64 / start as f64 * 100.0),
            rate_per_sec: (elapsed_secs > 0.0).then(|| absolute as f64 / elapsed_secs),
        }
    }
}

/// Change between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthAnalysis {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub rss: Option<MetricGrowth>,
    pub heap_used: Option<MetricGrowth>,
    pub external: Option<MetricGrowth>,
}

impl GrowthAnalysis {
    pub fn between(first: &MemorySnapshot, last: &MemorySnapshot) -> Self {
        let elapsed_secs = (last.timestamp - first.timestamp)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let growth = |metric: Metric| match (metric.value(first), metric.value(last)) {
            (Some(start), Some(end)) => Some(MetricGrowth::compute(start, end, elapsed_secs)),
            _ => None,
        };

        Self {
            from: first.timestamp,
            to: last.timestamp,
            elapsed_secs,
            rss: growth(Metric::Rss),
            heap_used: growth(Metric::HeapUsed),
            external: growth(Metric::External),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricGrowth> {
        match metric {
            Metric::Rss => self.rss.as_ref(),
            Metric::HeapUsed => self.heap_used.as_ref(),
            Metric::External => self.external.as_ref(),
        }
    }
}
