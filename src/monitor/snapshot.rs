use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::allocator::AllocatorStats;

/// Point-in-time reading of process memory counters.
///
/// Every counter is optional: a failed read leaves its field empty instead
/// of failing the whole capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub timestamp: DateTime<Utc>,
    pub label: Option<String>,
    pub rss: Option<u64>,
    pub heap_total: Option<u64>,
    pub heap_used: Option<u64>,
    pub external: Option<u64>,
    pub buffer_memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailedStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedStats {
    pub uptime_secs: Option<u64>,
    pub cpu_usage_percent: Option<f32>,
    pub virtual_memory: Option<u64>,
    pub allocator: Option<AllocatorStats>,
    /// Diagnostics that could not be read on this platform
    pub unavailable: Vec<String>,
}

impl MemorySnapshot {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            label: None,
            rss: None,
            heap_total: None,
            heap_used: None,
            external: None,
            buffer_memory: None,
            details: None,
        }
    }

    /// Snapshot carrying only heap counters
    pub fn with_heap(timestamp: DateTime<Utc>, heap_used: u64, heap_total: u64) -> Self {
        Self {
            heap_used: Some(heap_used),
            heap_total: Some(heap_total),
            ..Self::empty(timestamp)
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// heap_used / heap_total, when both are known and total is non-zero
    pub fn heap_utilization(&self) -> Option<f64> {
        match (self.heap_used, self.heap_total) {
            (Some(used), Some(total)) if total > 0 => Some(used as f64 / total as f64),
            _ => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.rss.is_none() || self.heap_used.is_none() || self.heap_total.is_none() || self.external.is_none()
    }
}

/// Metrics tracked by the trend analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Rss,
    HeapUsed,
    External,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Rss, Metric::HeapUsed, Metric::External];

    pub fn value(self, snapshot: &MemorySnapshot) -> Option<u64> {
        match self {
            Metric::Rss => snapshot.rss,
            Metric::HeapUsed => snapshot.heap_used,
            Metric::External => snapshot.external,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Rss => "rss",
            Metric::HeapUsed => "heap_used",
            Metric::External => "external",
        }
    }
}

/// Size-bounded FIFO of snapshots
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<MemorySnapshot>,
    max_samples: usize,
    evicted: u64,
}

impl SampleWindow {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples,
            evicted: 0,
        }
    }

    /// Append, evicting the oldest sample when full
    pub fn push(&mut self, snapshot: MemorySnapshot) -> Option<MemorySnapshot> {
        let evicted = if self.samples.len() >= self.max_samples {
            self.evicted += 1;
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(snapshot);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn first(&self) -> Option<&MemorySnapshot> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&MemorySnapshot> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemorySnapshot> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<MemorySnapshot> {
        self.samples.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.evicted = 0;
    }
}
