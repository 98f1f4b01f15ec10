use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

use super::collector::Collector;
use crate::config::defaults::COLLECTOR_HISTORY_LIMIT;
use crate::monitor::MemoryProbe;

/// One observed collection cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub memory_before: Option<u64>,
    pub memory_after: Option<u64>,
    pub freed_bytes: u64,
    pub duration_ms: f64,
    /// heap_used / heap_total right after the cycle
    pub utilization_after: Option<f64>,
    /// False when the underlying hook reported it could not act
    pub performed: bool,
}

/// Wraps a collector hook and measures each cycle
pub struct InstrumentedCollector {
    inner: Arc<dyn Collector>,
    probe: Arc<dyn MemoryProbe>,
    sequence: AtomicU64,
    history: Mutex<VecDeque<CollectorEvent>>,
}

impl InstrumentedCollector {
    pub fn new(inner: Arc<dyn Collector>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            inner,
            probe,
            sequence: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn collect(&self) -> CollectorEvent {
        let before = self.probe.read();
        let started = Instant::now();
        let performed = self.inner.collect();
        let elapsed = started.elapsed();
        let after = self.probe.read();

        let utilization_after = match (after.heap_used, after.heap_total) {
            (Some(used), Some(total)) if total > 0 => Some(used as f64 / total as f64),
            _ => None,
        };
        let freed_bytes = match (before.heap_used, after.heap_used) {
            (Some(b), Some(a)) => b.saturating_sub(a),
            _ => 0,
        };

        let event = CollectorEvent {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            memory_before: before.heap_used,
            memory_after: after.heap_used,
            freed_bytes,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            utilization_after,
            performed,
        };

        debug!(
            "Collector '{}' cycle #{} freed {} bytes in {:.2}ms",
            self.inner.name(),
            event.sequence,
            event.freed_bytes,
            event.duration_ms
        );

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() >= COLLECTOR_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(event.clone());

        event
    }

    pub fn count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> Vec<CollectorEvent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn last_event(&self) -> Option<CollectorEvent> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).back().cloned()
    }

    /// Events recorded at or after `since`
    pub fn events_since(&self, since: DateTime<Utc>) -> Vec<CollectorEvent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect()
    }
}
