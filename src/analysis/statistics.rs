use serde::Serialize;

use crate::monitor::{MemorySnapshot, Metric};

/// Distribution summary of one metric over the sample window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStatistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl MetricStatistics {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            std_dev: variance.sqrt(),
        })
    }

    /// std_dev / mean; zero when the mean is zero
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            self.std_dev / self.mean
        }
    }
}

/// Linear interpolation between closest ranks; `sorted` must be ascending and non-empty
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowStatistics {
    pub rss: Option<MetricStatistics>,
    pub heap_used: Option<MetricStatistics>,
    pub external: Option<MetricStatistics>,
}

impl WindowStatistics {
    pub fn compute(samples: &[MemorySnapshot]) -> Self {
        let stats_for = |metric: Metric| {
            let values: Vec<f64> = samples
                .iter()
                .filter_map(|s| metric.value(s))
                .map(|v| v as f64)
                .collect();
            MetricStatistics::from_values(&values)
        };

        let mut stats = Self::default();
        for metric in Metric::ALL {
            *stats.slot(metric) = stats_for(metric);
        }
        stats
    }

    fn slot(&mut self, metric: Metric) -> &mut Option<MetricStatistics> {
        match metric {
            Metric::Rss => &mut self.rss,
            Metric::HeapUsed => &mut self.heap_used,
            Metric::External => &mut self.external,
        }
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricStatistics> {
        match metric {
            Metric::Rss => self.rss.as_ref(),
            Metric::HeapUsed => self.heap_used.as_ref(),
            Metric::External => self.external.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const MB: f64 = 1024.0 * 1024.0;

    #[test]
    fn test_five_value_statistics() {
        let values: Vec<f64> = [10.0, 20.0, 30.0, 40.0, 50.0].iter().map(|v| v * MB).collect();
        let stats = MetricStatistics::from_values(&values).unwrap();

        assert!((stats.mean - 30.0 * MB).abs() < 1e-6);
        assert!((stats.median - 30.0 * MB).abs() < 1e-6);
        assert!(stats.p95 >= 40.0 * MB && stats.p95 <= 50.0 * MB);
        assert!(stats.p99 >= 40.0 * MB && stats.p99 <= 50.0 * MB);
        assert_eq!(stats.min, 10.0 * MB);
        assert_eq!(stats.max, 50.0 * MB);

        // Population formula: sqrt(((-20)^2 + (-10)^2 + 0 + 10^2 + 20^2) / 5) = sqrt(200)
        let expected = 200.0_f64.sqrt() * MB;
        assert!((stats.std_dev - expected).abs() < 1e-6);
    }

    #[test]
    fn test_unsorted_input_and_single_value() {
        let stats = MetricStatistics::from_values(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(stats.median, 2.0);

        let single = MetricStatistics::from_values(&[7.0]).unwrap();
        assert_eq!(single.p99, 7.0);
        assert_eq!(single.std_dev, 0.0);

        assert!(MetricStatistics::from_values(&[]).is_none());
    }

    #[test]
    fn test_even_count_median_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.5), 2.5);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_window_statistics_skips_missing_counters() {
        let now = Utc::now();
        let samples = vec![
            MemorySnapshot::with_heap(now, 100, 1000),
            MemorySnapshot::with_heap(now, 300, 1000),
        ];
        let stats = WindowStatistics::compute(&samples);
        assert_eq!(stats.heap_used.map(|s| s.mean), Some(200.0));
        assert!(stats.rss.is_none());
        assert!(stats.external.is_none());
    }

    #[test]
    fn test_window_statistics_covers_every_metric() {
        let now = Utc::now();
        let samples: Vec<MemorySnapshot> = [10u64, 20, 30]
            .iter()
            .map(|v| MemorySnapshot {
                rss: Some(v * 4),
                external: Some(v * 2),
                ..MemorySnapshot::with_heap(now, *v, 1000)
            })
            .collect();

        let stats = WindowStatistics::compute(&samples);
        for metric in Metric::ALL {
            assert_eq!(stats.get(metric).map(|s| s.count), Some(3), "{}", metric.name());
        }
        assert_eq!(stats.get(Metric::Rss).map(|s| s.median), Some(80.0));
        assert_eq!(stats.get(Metric::External).map(|s| s.max), Some(60.0));
    }
}
