use serde::{Deserialize, Serialize};

use crate::analysis::{CollectorAnalysis, LeakAssessment, MetricGrowth, MetricStatistics};
use crate::cache::CacheStats;
use crate::pool::PoolStats;

const MB: f64 = 1024.0 * 1024.0;

const GROWTH_HIGH_PERCENT: f64 = 50.0;
const GROWTH_MEDIUM_PERCENT: f64 = 20.0;
/// Utilization above this share of the threshold is reported as approaching it
const UTILIZATION_WARN_FRACTION: f64 = 0.9;
const VOLATILITY_MEDIUM_CV: f64 = 0.5;
const VOLATILITY_LOW_CV: f64 = 0.25;
const CACHE_MIN_LOOKUPS: u64 = 100;
const CACHE_LOW_HIT_RATE: f64 = 0.5;
const POOL_MIN_ACQUIRES: u64 = 100;
const POOL_LOW_REUSE_RATE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    HeapGrowth,
    MemoryLeak,
    HeapUtilization,
    CollectorPause,
    CollectorFrequency,
    MemoryVolatility,
    CacheEfficiency,
    PoolEfficiency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub message: String,
    pub suggested_actions: Vec<String>,
}

impl Recommendation {
    fn new(kind: RecommendationType, priority: Priority, message: String, actions: &[&str]) -> Self {
        Self {
            kind,
            priority,
            message,
            suggested_actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Inputs of all rules, borrowed from the analyzed session
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInput<'a> {
    pub heap_growth: Option<&'a MetricGrowth>,
    pub heap_statistics: Option<&'a MetricStatistics>,
    pub leak: Option<&'a LeakAssessment>,
    pub utilization: Option<f64>,
    pub threshold: f64,
    pub collector: Option<&'a CollectorAnalysis>,
    pub pause_warn_ms: u64,
    pub caches: &'a [CacheStats],
    pub pools: &'a [PoolStats],
}

/// Apply every rule, highest priority first
pub fn recommend(input: &RecommendationInput<'_>) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = [
        input.heap_growth.and_then(heap_growth),
        input.leak.and_then(memory_leak),
        heap_utilization(input.utilization, input.threshold),
        input.collector.and_then(|c| collector_pause(c, input.pause_warn_ms)),
        input.collector.and_then(collector_frequency),
        input.heap_statistics.and_then(memory_volatility),
        cache_efficiency(input.caches),
        pool_efficiency(input.pools),
    ]
    .into_iter()
    .flatten()
    .collect();

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

pub fn heap_growth(growth: &MetricGrowth) -> Option<Recommendation> {
    let percent = growth.percent?;
    let priority = if percent > GROWTH_HIGH_PERCENT {
        Priority::High
    } else if percent > GROWTH_MEDIUM_PERCENT {
        Priority::Medium
    } else {
        return None;
    };

    let rate = growth
        .rate_per_sec
        .map(|r| format!(" ({:.2} MB/s)", r / MB))
        .unwrap_or_default();
    Some(Recommendation::new(
        RecommendationType::HeapGrowth,
        priority,
        format!("Heap usage grew {:.1}% since baseline{}", percent, rate),
        &[
            "Review long-lived caches and collections for unbounded growth",
            "Lower cache category sizes or TTLs",
            "Compare allocation counters across releases",
        ],
    ))
}

pub fn memory_leak(assessment: &LeakAssessment) -> Option<Recommendation> {
    if !assessment.suspected {
        return None;
    }
    Some(Recommendation::new(
        RecommendationType::MemoryLeak,
        Priority::High,
        format!(
            "Heap usage did not decrease across the last {} samples (+{:.2} MB)",
            assessment.window,
            assessment.growth_bytes as f64 / MB
        ),
        &[
            "Capture a heap profile while the growth continues",
            "Check that pooled objects are released after use",
            "Look for listeners or caches that are never cleared",
        ],
    ))
}

pub fn heap_utilization(utilization: Option<f64>, threshold: f64) -> Option<Recommendation> {
    let utilization = utilization?;
    let priority = if utilization > threshold {
        Priority::High
    } else if utilization > threshold * UTILIZATION_WARN_FRACTION {
        Priority::Medium
    } else {
        return None;
    };
    Some(Recommendation::new(
        RecommendationType::HeapUtilization,
        priority,
        format!(
            "Heap utilization at {:.1}% (pressure threshold {:.1}%)",
            utilization * 100.0,
            threshold * 100.0
        ),
        &[
            "Raise the configured max heap size",
            "Reduce cache capacity",
            "Enable pooling for hot allocation paths",
        ],
    ))
}

pub fn collector_pause(analysis: &CollectorAnalysis, pause_warn_ms: u64) -> Option<Recommendation> {
    if !analysis.excessive_pause {
        return None;
    }
    let average = analysis.average_pause_ms?;
    Some(Recommendation::new(
        RecommendationType::CollectorPause,
        Priority::Medium,
        format!(
            "Average collection pause {:.1}ms exceeds {}ms",
            average, pause_warn_ms
        ),
        &[
            "Reduce heap fragmentation by reusing buffers through pools",
            "Lower the number of aggressive collection cycles",
        ],
    ))
}

pub fn collector_frequency(analysis: &CollectorAnalysis) -> Option<Recommendation> {
    if !analysis.excessive_frequency {
        return None;
    }
    let rate = analysis
        .events_per_minute
        .map(|r| format!(" ({:.1}/min)", r))
        .unwrap_or_default();
    Some(Recommendation::new(
        RecommendationType::CollectorFrequency,
        Priority::Medium,
        format!("{} collections observed{}", analysis.event_count, rate),
        &[
            "Raise the pressure threshold ratio",
            "Reduce short-lived allocations on request paths",
        ],
    ))
}

pub fn memory_volatility(stats: &MetricStatistics) -> Option<Recommendation> {
    let cv = stats.coefficient_of_variation();
    let priority = if cv > VOLATILITY_MEDIUM_CV {
        Priority::Medium
    } else if cv > VOLATILITY_LOW_CV {
        Priority::Low
    } else {
        return None;
    };
    Some(Recommendation::new(
        RecommendationType::MemoryVolatility,
        priority,
        format!(
            "Heap usage is volatile (std dev {:.2} MB, {:.0}% of mean)",
            stats.std_dev / MB,
            cv * 100.0
        ),
        &[
            "Batch large allocations",
            "Reuse byte buffers through the buffer pool",
        ],
    ))
}

pub fn cache_efficiency(caches: &[CacheStats]) -> Option<Recommendation> {
    let poor: Vec<String> = caches
        .iter()
        .filter(|c| c.lookups() >= CACHE_MIN_LOOKUPS && c.hit_rate() < CACHE_LOW_HIT_RATE)
        .map(|c| format!("{} ({:.0}%)", c.name, c.hit_rate() * 100.0))
        .collect();
    if poor.is_empty() {
        return None;
    }
    Some(Recommendation::new(
        RecommendationType::CacheEfficiency,
        Priority::Low,
        format!("Low cache hit rate: {}", poor.join(", ")),
        &[
            "Increase TTL for stable data",
            "Increase max entries if evictions are frequent",
            "Stop caching values that are rarely read twice",
        ],
    ))
}

pub fn pool_efficiency(pools: &[PoolStats]) -> Option<Recommendation> {
    let poor: Vec<String> = pools
        .iter()
        .filter(|p| p.created + p.reused >= POOL_MIN_ACQUIRES && p.reuse_rate() < POOL_LOW_REUSE_RATE)
        .map(|p| format!("{} ({:.0}%)", p.name, p.reuse_rate() * 100.0))
        .collect();
    if poor.is_empty() {
        return None;
    }
    Some(Recommendation::new(
        RecommendationType::PoolEfficiency,
        Priority::Low,
        format!("Low pool reuse: {}", poor.join(", ")),
        &[
            "Release objects back to the pool after use",
            "Raise the pool max size",
            "Pass size hints that match typical requests",
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CollectorSource, MetricGrowth};

    #[test]
    fn test_heap_growth_priorities() {
        let high = MetricGrowth::compute(100, 160, 10.0);
        assert_eq!(heap_growth(&high).map(|r| r.priority), Some(Priority::High));

        let medium = MetricGrowth::compute(100, 130, 10.0);
        assert_eq!(heap_growth(&medium).map(|r| r.priority), Some(Priority::Medium));

        assert!(heap_growth(&MetricGrowth::compute(100, 105, 10.0)).is_none());
        assert!(heap_growth(&MetricGrowth::compute(0, 105, 10.0)).is_none());
    }

    #[test]
    fn test_leak_and_utilization_rules() {
        let leak = LeakAssessment {
            suspected: true,
            window: 10,
            samples_considered: 10,
            first_heap_used: Some(0),
            last_heap_used: Some(1024),
            growth_bytes: 1024,
        };
        let rec = memory_leak(&leak).unwrap();
        assert_eq!(rec.kind, RecommendationType::MemoryLeak);
        assert_eq!(rec.priority, Priority::High);
        assert!(!rec.suggested_actions.is_empty());

        assert_eq!(heap_utilization(Some(0.85), 0.8).map(|r| r.priority), Some(Priority::High));
        assert_eq!(heap_utilization(Some(0.75), 0.8).map(|r| r.priority), Some(Priority::Medium));
        assert!(heap_utilization(Some(0.5), 0.8).is_none());
        assert!(heap_utilization(None, 0.8).is_none());
    }

    #[test]
    fn test_collector_rules() {
        let analysis = CollectorAnalysis {
            source: CollectorSource::Hook,
            event_count: 40,
            total_pause_ms: Some(8000.0),
            average_pause_ms: Some(200.0),
            max_pause_ms: Some(400.0),
            total_freed_bytes: 0,
            observed_secs: 60.0,
            events_per_minute: Some(40.0),
            excessive_pause: true,
            excessive_frequency: true,
        };
        assert!(collector_pause(&analysis, 100).is_some());
        assert!(collector_frequency(&analysis).is_some());
    }

    #[test]
    fn test_efficiency_rules() {
        let caches = vec![
            CacheStats { name: "query".into(), hits: 10, misses: 190, ..Default::default() },
            CacheStats { name: "node".into(), hits: 1, misses: 1, ..Default::default() },
        ];
        let rec = cache_efficiency(&caches).unwrap();
        assert!(rec.message.contains("query"));
        assert!(!rec.message.contains("node"));

        let pools = vec![PoolStats { name: "buffer".into(), created: 150, reused: 10, ..Default::default() }];
        assert!(pool_efficiency(&pools).is_some());
        assert!(pool_efficiency(&[]).is_none());
    }

    #[test]
    fn test_recommend_orders_by_priority() {
        let growth = MetricGrowth::compute(100, 130, 10.0);
        let pools = vec![PoolStats { name: "buffer".into(), created: 150, ..Default::default() }];
        let input = RecommendationInput {
            heap_growth: Some(&growth),
            heap_statistics: None,
            leak: None,
            utilization: Some(0.95),
            threshold: 0.8,
            collector: None,
            pause_warn_ms: 100,
            caches: &[],
            pools: &pools,
        };
        let recs = recommend(&input);
        let priorities: Vec<Priority> = recs.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_serialized_shape() {
        let rec = heap_utilization(Some(0.9), 0.8).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "heap_utilization");
        assert_eq!(json["priority"], "high");
    }
}
