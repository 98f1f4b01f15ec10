use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gc::CollectorEvent;
use crate::monitor::MemorySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorSource {
    /// Events from an injected collector hook
    Hook,
    /// Approximated from heap drops between consecutive samples
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorThresholds {
    pub pause_warn_ms: u64,
    pub max_per_minute: u32,
}

/// Heap drop between two samples treated as a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredCollection {
    pub timestamp: DateTime<Utc>,
    pub memory_before: u64,
    pub memory_after: u64,
    pub freed_bytes: u64,
}

/// Scans consecutive samples for heap_used drops of at least `drop_ratio`
pub fn infer_collections(samples: &[MemorySnapshot], drop_ratio: f64) -> Vec<InferredCollection> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let before = pair[0].heap_used?;
            let after = pair[1].heap_used?;
            if before == 0 || after >= before {
                return None;
            }
            let freed = before - after;
            (freed as f64 / before as f64 >= drop_ratio).then(|| InferredCollection {
                timestamp: pair[1].timestamp,
                memory_before: before,
                memory_after: after,
                freed_bytes: freed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorAnalysis {
    pub source: CollectorSource,
    pub event_count: usize,
    /// Pause figures are unknown for inferred collections
    pub total_pause_ms: Option<f64>,
    pub average_pause_ms: Option<f64>,
    pub max_pause_ms: Option<f64>,
    pub total_freed_bytes: u64,
    pub observed_secs: f64,
    pub events_per_minute: Option<f64>,
    pub excessive_pause: bool,
    pub excessive_frequency: bool,
}

impl CollectorAnalysis {
    pub fn from_events(events: &[CollectorEvent], observed_secs: f64, thresholds: CollectorThresholds) -> Self {
        let count = events.len();
        let total_pause: f64 = events.iter().map(|e| e.duration_ms).sum();
        let average_pause = (count > 0).then(|| total_pause / count as f64);
        let max_pause = events.iter().map(|e| e.duration_ms).reduce(f64::max);

        Self {
            source: CollectorSource::Hook,
            event_count: count,
            total_pause_ms: Some(total_pause),
            average_pause_ms: average_pause,
            max_pause_ms: max_pause,
            total_freed_bytes: events.iter().map(|e| e.freed_bytes).sum(),
            observed_secs,
            events_per_minute: per_minute(count, observed_secs),
            excessive_pause: average_pause.is_some_and(|avg| avg > thresholds.pause_warn_ms as f64),
            excessive_frequency: exceeds_frequency(count, observed_secs, thresholds.max_per_minute),
        }
    }

    pub fn from_inferred(inferred: &[InferredCollection], observed_secs: f64, thresholds: CollectorThresholds) -> Self {
        let count = inferred.len();
        Self {
            source: CollectorSource::Inferred,
            event_count: count,
            total_pause_ms: None,
            average_pause_ms: None,
            max_pause_ms: None,
            total_freed_bytes: inferred.iter().map(|c| c.freed_bytes).sum(),
            observed_secs,
            events_per_minute: per_minute(count, observed_secs),
            excessive_pause: false,
            excessive_frequency: exceeds_frequency(count, observed_secs, thresholds.max_per_minute),
        }
    }
}

fn per_minute(count: usize, observed_secs: f64) -> Option<f64> {
    (observed_secs > 0.0).then(|| count as f64 / (observed_secs / 60.0))
}

// Windows shorter than a minute are judged against one minute's budget
fn exceeds_frequency(count: usize, observed_secs: f64, max_per_minute: u32) -> bool {
    let minutes = (observed_secs / 60.0).max(1.0);
    count as f64 > max_per_minute as f64 * minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const THRESHOLDS: CollectorThresholds = CollectorThresholds {
        pause_warn_ms: 100,
        max_per_minute: 30,
    };

    fn event(sequence: u64, duration_ms: f64, freed: u64) -> CollectorEvent {
        CollectorEvent {
            sequence,
            timestamp: Utc::now(),
            memory_before: Some(1000 + freed),
            memory_after: Some(1000),
            freed_bytes: freed,
            duration_ms,
            utilization_after: None,
            performed: true,
        }
    }

    #[test]
    fn test_hook_events_aggregate() {
        let events = vec![event(1, 50.0, 10), event(2, 250.0, 30)];
        let analysis = CollectorAnalysis::from_events(&events, 120.0, THRESHOLDS);

        assert_eq!(analysis.event_count, 2);
        assert_eq!(analysis.total_pause_ms, Some(300.0));
        assert_eq!(analysis.average_pause_ms, Some(150.0));
        assert_eq!(analysis.max_pause_ms, Some(250.0));
        assert_eq!(analysis.total_freed_bytes, 40);
        assert_eq!(analysis.events_per_minute, Some(1.0));
        assert!(analysis.excessive_pause);
        assert!(!analysis.excessive_frequency);
    }

    #[test]
    fn test_frequency_bound() {
        let events: Vec<_> = (1..=31).map(|i| event(i, 1.0, 0)).collect();
        assert!(CollectorAnalysis::from_events(&events, 30.0, THRESHOLDS).excessive_frequency);
        assert!(!CollectorAnalysis::from_events(&events, 120.0, THRESHOLDS).excessive_frequency);
    }

    #[test]
    fn test_inferred_from_heap_drops() {
        let start = Utc::now();
        let heap = [100, 110, 90, 95, 94];
        let samples: Vec<_> = heap
            .iter()
            .enumerate()
            .map(|(i, used)| MemorySnapshot::with_heap(start + Duration::seconds(i as i64), *used, 200))
            .collect();

        let inferred = infer_collections(&samples, 0.10);
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].freed_bytes, 20);

        let analysis = CollectorAnalysis::from_inferred(&inferred, 4.0, THRESHOLDS);
        assert_eq!(analysis.source, CollectorSource::Inferred);
        assert_eq!(analysis.average_pause_ms, None);
        assert!(!analysis.excessive_pause);
    }
}
