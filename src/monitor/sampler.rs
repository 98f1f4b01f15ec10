use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use super::probe::MemoryProbe;
use super::snapshot::{MemorySnapshot, SampleWindow};
use crate::analysis::leak::{detect_leak, LeakAssessment};
use crate::memory::errors::MemoryError;

#[derive(Debug)]
struct SessionState {
    session: Option<Uuid>,
    baseline: Option<MemorySnapshot>,
    window: SampleWindow,
    started_at: Option<DateTime<Utc>>,
    /// Samples captured this session, including evicted ones
    captured: u64,
    last_leak_flag: Option<u64>,
}

/// Captured data of one profiling session
#[derive(Debug, Clone)]
pub struct SessionData {
    pub started_at: Option<DateTime<Utc>>,
    pub baseline: Option<MemorySnapshot>,
    pub samples: Vec<MemorySnapshot>,
    pub captured: u64,
    pub evicted: u64,
}

/// Captures snapshots into a bounded window anchored to a baseline
pub struct MemorySampler {
    probe: Arc<dyn MemoryProbe>,
    detailed: bool,
    state: Mutex<SessionState>,
    capture_failures: AtomicU64,
}

impl MemorySampler {
    pub fn new(probe: Arc<dyn MemoryProbe>, max_samples: usize, detailed: bool) -> Self {
        Self {
            probe,
            detailed,
            state: Mutex::new(SessionState {
                session: None,
                baseline: None,
                window: SampleWindow::new(max_samples),
                started_at: None,
                captured: 0,
                last_leak_flag: None,
            }),
            capture_failures: AtomicU64::new(0),
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    /// Read the probe into a snapshot. Failed counters are left empty.
    pub fn capture(&self, label: Option<&str>, buffer_memory: Option<u64>) -> MemorySnapshot {
        let reading = self.probe.read();
        if let Some(error) = capture_error(&reading.errors) {
            self.capture_failures.fetch_add(1, Ordering::Relaxed);
            debug!("Partial memory capture: {}", error);
        }

        MemorySnapshot {
            timestamp: Utc::now(),
            label: label.map(str::to_string),
            rss: reading.rss,
            heap_total: reading.heap_total,
            heap_used: reading.heap_used,
            external: reading.external,
            buffer_memory,
            details: if self.detailed { self.probe.read_details() } else { None },
        }
    }

    /// Start a session: installs the baseline and empties the window
    pub fn begin(&self, session_id: Uuid, baseline: MemorySnapshot) {
        let mut state = self.session();
        state.window.clear();
        state.session = Some(session_id);
        state.started_at = Some(baseline.timestamp);
        state.baseline = Some(baseline);
        state.captured = 0;
        state.last_leak_flag = None;
    }

    /// End `session_id` and hand back its data. `None` if another session is current.
    pub fn finish(&self, session_id: Uuid) -> Option<SessionData> {
        let mut state = self.session();
        if state.session != Some(session_id) {
            return None;
        }
        let data = Self::collect(&state);
        state.window.clear();
        state.session = None;
        state.baseline = None;
        state.started_at = None;
        state.captured = 0;
        state.last_leak_flag = None;
        Some(data)
    }

    /// Append a periodic sample to `session_id`. Returns the session's capture
    /// count, or `None` when that session has already ended.
    pub fn record(&self, session_id: Uuid, snapshot: MemorySnapshot) -> Option<u64> {
        let mut state = self.session();
        if state.session != Some(session_id) {
            return None;
        }
        state.window.push(snapshot);
        state.captured += 1;
        Some(state.captured)
    }

    /// Leak check over the latest `window` samples, debounced to one flag per window
    pub fn check_leak(&self, window: usize) -> Option<LeakAssessment> {
        let mut session = self.session();
        let captured = session.captured;
        if let Some(flagged_at) = session.last_leak_flag {
            if captured < flagged_at + window as u64 {
                return None;
            }
        }

        let recent: Vec<&MemorySnapshot> = {
            let skip = session.window.len().saturating_sub(window);
            session.window.iter().skip(skip).collect()
        };
        let assessment = detect_leak(recent.into_iter(), window);
        if assessment.suspected {
            session.last_leak_flag = Some(captured);
            Some(assessment)
        } else {
            None
        }
    }

    pub fn baseline(&self) -> Option<MemorySnapshot> {
        self.session().baseline.clone()
    }

    pub fn latest(&self) -> Option<MemorySnapshot> {
        let session = self.session();
        session.window.last().cloned().or_else(|| session.baseline.clone())
    }

    pub fn sample_count(&self) -> usize {
        self.session().window.len()
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures.load(Ordering::Relaxed)
    }

    pub fn data(&self) -> SessionData {
        Self::collect(&self.session())
    }

    fn collect(session: &SessionState) -> SessionData {
        SessionData {
            started_at: session.started_at,
            baseline: session.baseline.clone(),
            samples: session.window.to_vec(),
            captured: session.captured,
            evicted: session.window.evicted(),
        }
    }
}

/// Fold probe read failures into one capture error
fn capture_error(errors: &[String]) -> Option<MemoryError> {
    if errors.is_empty() {
        return None;
    }
    Some(MemoryError::Capture { message: errors.join("; ") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::probe::ProbeReading;

    /// Probe replaying a fixed heap sequence
    struct ScriptedProbe {
        heap: Mutex<Vec<u64>>,
    }

    impl MemoryProbe for ScriptedProbe {
        fn read(&self) -> ProbeReading {
            let mut heap = self.heap.lock().unwrap();
            let used = if heap.len() > 1 { heap.remove(0) } else { heap[0] };
            ProbeReading {
                rss: Some(used * 2),
                heap_total: Some(1000),
                heap_used: Some(used),
                external: None,
                errors: vec!["external unavailable".to_string()],
            }
        }
    }

    fn sampler(heap: Vec<u64>, max_samples: usize) -> MemorySampler {
        MemorySampler::new(Arc::new(ScriptedProbe { heap: Mutex::new(heap) }), max_samples, false)
    }

    #[test]
    fn test_partial_capture_counts_failure() {
        let sampler = sampler(vec![10], 5);
        let snapshot = sampler.capture(Some("tick"), Some(64));
        assert_eq!(snapshot.heap_used, Some(10));
        assert_eq!(snapshot.external, None);
        assert_eq!(snapshot.buffer_memory, Some(64));
        assert_eq!(snapshot.label.as_deref(), Some("tick"));
        assert_eq!(sampler.capture_failures(), 1);
    }

    #[test]
    fn test_capture_error_joins_probe_failures() {
        assert!(capture_error(&[]).is_none());
        let err = capture_error(&["rss unavailable".to_string(), "heap unavailable".to_string()]).unwrap();
        assert_eq!(err.code(), "capture");
        assert_eq!(err.to_string(), "Capture error: rss unavailable; heap unavailable");
    }

    #[test]
    fn test_window_bounded_and_baseline_separate() {
        let sampler = sampler((0..20).collect(), 5);
        let session = Uuid::new_v4();
        let baseline = sampler.capture(Some("baseline"), None);
        sampler.begin(session, baseline);

        for _ in 0..12 {
            let s = sampler.capture(None, None);
            sampler.record(session, s);
        }

        let data = sampler.data();
        assert_eq!(data.samples.len(), 5);
        assert_eq!(data.captured, 12);
        assert_eq!(data.evicted, 7);
        assert_eq!(data.baseline.and_then(|b| b.heap_used), Some(0));
    }

    #[test]
    fn test_leak_flag_debounced_per_window() {
        let sampler = sampler((1..=40).collect(), 100);
        let session = Uuid::new_v4();
        let baseline = sampler.capture(Some("baseline"), None);
        sampler.begin(session, baseline);

        let mut flags = 0;
        for _ in 0..30 {
            let s = sampler.capture(None, None);
            sampler.record(session, s);
            if sampler.check_leak(10).is_some() {
                flags += 1;
            }
        }
        // Flags at sample 10, 20 and 30
        assert_eq!(flags, 3);
    }

    #[test]
    fn test_ended_session_ignores_late_samples() {
        let sampler = sampler(vec![10, 20, 30, 40], 5);
        let old = Uuid::new_v4();
        sampler.begin(old, sampler.capture(Some("baseline"), None));
        assert_eq!(sampler.record(old, sampler.capture(None, None)), Some(1));

        let data = sampler.finish(old).unwrap();
        assert_eq!(data.samples.len(), 1);
        assert!(data.baseline.is_some());
        assert!(sampler.finish(old).is_none());

        let current = Uuid::new_v4();
        sampler.begin(current, sampler.capture(Some("baseline"), None));
        // A tick of the old session landing after the new one began
        assert_eq!(sampler.record(old, sampler.capture(None, None)), None);
        assert!(sampler.finish(old).is_none());
        assert_eq!(sampler.sample_count(), 0);
        assert!(sampler.baseline().is_some());
    }
}
