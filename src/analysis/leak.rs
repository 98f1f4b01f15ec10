use serde::Serialize;

use crate::monitor::MemorySnapshot;

/// Result of the monotonic-growth leak heuristic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeakAssessment {
    pub suspected: bool,
    pub window: usize,
    pub samples_considered: usize,
    pub first_heap_used: Option<u64>,
    pub last_heap_used: Option<u64>,
    pub growth_bytes: i64,
}

/// Flags a leak when heap_used never decreases across the last `window` samples.
///
/// Samples without a heap reading are ignored. Fewer than `window` readings
/// never flag. No hysteresis: callers debounce repeated flags.
pub fn detect_leak<'a, I>(samples: I, window: usize) -> LeakAssessment
where
    I: IntoIterator<Item = &'a MemorySnapshot>,
{
    let heap: Vec<u64> = samples.into_iter().filter_map(|s| s.heap_used).collect();
    let recent = &heap[heap.len().saturating_sub(window)..];

    let first = recent.first().copied();
    let last = recent.last().copied();
    let growth_bytes = match (first, last) {
        (Some(first), Some(last)) => last as i64 - first as i64,
        _ => 0,
    };

    let suspected = window >= 2
        && recent.len() >= window
        && recent.windows(2).all(|pair| pair[1] >= pair[0]);

    LeakAssessment {
        suspected,
        window,
        samples_considered: recent.len(),
        first_heap_used: first,
        last_heap_used: last,
        growth_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const MB: u64 = 1024 * 1024;

    fn samples(heap_mb: &[u64]) -> Vec<MemorySnapshot> {
        let now = Utc::now();
        heap_mb
            .iter()
            .map(|mb| MemorySnapshot::with_heap(now, mb * MB, 1024 * MB))
            .collect()
    }

    #[test]
    fn test_strictly_increasing_run_flags_leak() {
        let heap: Vec<u64> = (10..20).collect();
        let assessment = detect_leak(&samples(&heap), 10);
        assert!(assessment.suspected);
        assert_eq!(assessment.growth_bytes, 9 * MB as i64);
    }

    #[test]
    fn test_oscillating_run_does_not_flag() {
        let heap = [10, 9, 11, 9, 12, 9, 13, 9, 14, 9];
        assert!(!detect_leak(&samples(&heap), 10).suspected);
    }

    #[test]
    fn test_only_latest_window_counts() {
        // Early dip is outside the last 10 samples
        let mut heap = vec![50, 5];
        heap.extend(10..20);
        assert!(detect_leak(&samples(&heap), 10).suspected);
    }

    #[test]
    fn test_too_few_samples() {
        let heap: Vec<u64> = (10..15).collect();
        let assessment = detect_leak(&samples(&heap), 10);
        assert!(!assessment.suspected);
        assert_eq!(assessment.samples_considered, 5);
    }
}
