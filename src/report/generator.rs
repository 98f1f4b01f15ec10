use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::recommendations::{recommend, Priority, Recommendation, RecommendationInput};
use crate::analysis::{
    detect_leak, infer_collections, CollectorAnalysis, CollectorThresholds, GrowthAnalysis, LeakAssessment,
    WindowStatistics,
};
use crate::cache::CacheStats;
use crate::config::defaults::{INFERRED_COLLECTION_DROP_RATIO, REPORT_FILE_PREFIX};
use crate::config::MemoryConfig;
use crate::gc::CollectorEvent;
use crate::memory::errors::{MemoryError, MemoryResult};
use crate::monitor::{MemorySnapshot, SessionData};
use crate::optimizer::{CapabilityStatus, OptimizationRun};
use crate::pool::{InternStats, PoolStats};

#[derive(Debug, Clone, Serialize)]
pub struct ReportGrowth {
    /// Baseline against the latest sample
    pub since_baseline: Option<GrowthAnalysis>,
    /// First against last sample still in the window
    pub window: Option<GrowthAnalysis>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub collector: CapabilityStatus,
    pub detailed_stats: CapabilityStatus,
    pub allocator_tracking: CapabilityStatus,
}

/// Everything the report is assembled from
pub struct ReportContext<'a> {
    pub session_id: Uuid,
    pub session: &'a SessionData,
    pub capture_failures: u64,
    /// `None` when no collector hook is installed
    pub collector_events: Option<&'a [CollectorEvent]>,
    pub optimizations: Vec<OptimizationRun>,
    pub pools: Vec<PoolStats>,
    pub interning: InternStats,
    pub caches: Vec<CacheStats>,
    pub capabilities: Capabilities,
    pub config: &'a MemoryConfig,
}

/// Structured end-of-session report
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub sample_count: usize,
    pub samples_captured: u64,
    pub samples_evicted: u64,
    pub capture_failures: u64,
    pub baseline: Option<MemorySnapshot>,
    pub latest: Option<MemorySnapshot>,
    pub statistics: WindowStatistics,
    pub growth: ReportGrowth,
    pub leak: LeakAssessment,
    pub collector: CollectorAnalysis,
    pub optimizations: Vec<OptimizationRun>,
    pub pools: Vec<PoolStats>,
    pub interning: InternStats,
    pub caches: Vec<CacheStats>,
    pub capabilities: Capabilities,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<MemorySnapshot>>,
}

impl MemoryReport {
    pub fn build(ctx: ReportContext<'_>) -> Self {
        let generated_at = Utc::now();
        let session = ctx.session;
        let samples = &session.samples;
        let latest = samples.last().or(session.baseline.as_ref()).cloned();

        let duration_secs = session
            .started_at
            .and_then(|start| (generated_at - start).to_std().ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let statistics = WindowStatistics::compute(samples);
        let growth = ReportGrowth {
            since_baseline: match (&session.baseline, samples.last()) {
                (Some(baseline), Some(last)) => Some(GrowthAnalysis::between(baseline, last)),
                _ => None,
            },
            window: match (samples.first(), samples.last()) {
                (Some(first), Some(last)) if samples.len() >= 2 => Some(GrowthAnalysis::between(first, last)),
                _ => None,
            },
        };
        let leak = detect_leak(samples, ctx.config.leak_window);

        let thresholds = CollectorThresholds {
            pause_warn_ms: ctx.config.gc_pause_warn_ms,
            max_per_minute: ctx.config.gc_max_per_minute,
        };
        let collector = match ctx.collector_events {
            Some(events) => CollectorAnalysis::from_events(events, duration_secs, thresholds),
            None => CollectorAnalysis::from_inferred(
                &infer_collections(samples, INFERRED_COLLECTION_DROP_RATIO),
                duration_secs,
                thresholds,
            ),
        };

        let heap_growth = growth.since_baseline.as_ref().and_then(|g| g.heap_used.as_ref());
        let recommendations = recommend(&RecommendationInput {
            heap_growth,
            heap_statistics: statistics.heap_used.as_ref(),
            leak: Some(&leak),
            utilization: latest.as_ref().and_then(MemorySnapshot::heap_utilization),
            threshold: ctx.config.gc_threshold_ratio,
            collector: Some(&collector),
            pause_warn_ms: ctx.config.gc_pause_warn_ms,
            caches: &ctx.caches,
            pools: &ctx.pools,
        });

        Self {
            session_id: ctx.session_id,
            generated_at,
            started_at: session.started_at,
            duration_secs,
            sample_count: samples.len(),
            samples_captured: session.captured,
            samples_evicted: session.evicted,
            capture_failures: ctx.capture_failures,
            baseline: session.baseline.clone(),
            latest,
            statistics,
            growth,
            leak,
            collector,
            optimizations: ctx.optimizations,
            pools: ctx.pools,
            interning: ctx.interning,
            caches: ctx.caches,
            capabilities: ctx.capabilities,
            recommendations,
            samples: ctx.config.include_samples_in_report.then(|| samples.clone()),
        }
    }

    /// `memory-report-<YYYYMMDD-HHMMSS>-<session8>.json`
    pub fn file_name(&self) -> String {
        let session = self.session_id.simple().to_string();
        format!(
            "{}-{}-{}.json",
            REPORT_FILE_PREFIX,
            self.generated_at.format("%Y%m%d-%H%M%S"),
            &session[..8]
        )
    }

    /// Write the report as pretty JSON under `directory`
    pub async fn persist(&self, directory: &Path) -> MemoryResult<PathBuf> {
        let path = directory.join(self.file_name());
        let json = serde_json::to_vec_pretty(self)?;

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| MemoryError::Persistence { path: directory.to_path_buf(), source })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| MemoryError::Persistence { path: path.clone(), source })?;

        Ok(path)
    }

    /// Operator-facing summary on the log sink
    pub fn log_summary(&self) {
        info!(
            "Memory report {}: {} samples over {:.1}s ({} capture failures)",
            self.session_id, self.sample_count, self.duration_secs, self.capture_failures
        );

        if let Some(heap) = &self.statistics.heap_used {
            info!(
                "Heap used: mean {:.2} MB, p95 {:.2} MB, max {:.2} MB",
                heap.mean / 1_048_576.0,
                heap.p95 / 1_048_576.0,
                heap.max / 1_048_576.0
            );
        }
        if let Some(growth) = self.growth.since_baseline.as_ref().and_then(|g| g.heap_used.as_ref()) {
            info!(
                "Heap growth since baseline: {:+.2} MB ({})",
                growth.absolute as f64 / 1_048_576.0,
                growth
                    .percent
                    .map(|p| format!("{:+.1}%", p))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
        info!(
            "Collector ({:?}): {} events, {} optimization passes",
            self.collector.source,
            self.collector.event_count,
            self.optimizations.len()
        );

        for rec in &self.recommendations {
            match rec.priority {
                Priority::High => warn!("[{:?}] {}", rec.kind, rec.message),
                _ => info!("[{:?}] {}", rec.kind, rec.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const MB: u64 = 1024 * 1024;

    fn session(heap_mb: &[u64]) -> SessionData {
        let start = Utc::now() - Duration::seconds(heap_mb.len() as i64 + 1);
        let baseline = MemorySnapshot::with_heap(start, 100 * MB, 1024 * MB).labeled("baseline");
        let samples: Vec<_> = heap_mb
            .iter()
            .enumerate()
            .map(|(i, mb)| MemorySnapshot::with_heap(start + Duration::seconds(i as i64 + 1), mb * MB, 1024 * MB))
            .collect();
        SessionData {
            started_at: Some(start),
            baseline: Some(baseline),
            captured: samples.len() as u64,
            samples,
            evicted: 0,
        }
    }

    fn context<'a>(session: &'a SessionData, config: &'a MemoryConfig) -> ReportContext<'a> {
        ReportContext {
            session_id: Uuid::new_v4(),
            session,
            capture_failures: 0,
            collector_events: None,
            optimizations: Vec::new(),
            pools: Vec::new(),
            interning: InternStats::default(),
            caches: Vec::new(),
            capabilities: Capabilities {
                collector: CapabilityStatus::Unavailable,
                detailed_stats: CapabilityStatus::Unavailable,
                allocator_tracking: CapabilityStatus::Unavailable,
            },
            config,
        }
    }

    #[test]
    fn test_report_flags_growth_and_leak() {
        let config = MemoryConfig::default();
        let heap: Vec<u64> = (110..130).collect();
        let data = session(&heap);
        let report = MemoryReport::build(context(&data, &config));

        assert_eq!(report.sample_count, 20);
        assert!(report.leak.suspected);
        assert!(report.growth.since_baseline.is_some());
        assert!(report.samples.is_none());
        assert_eq!(report.collector.source, crate::analysis::CollectorSource::Inferred);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.kind == crate::report::RecommendationType::MemoryLeak));
    }

    #[test]
    fn test_empty_session_builds() {
        let config = MemoryConfig::default();
        let data = SessionData {
            started_at: None,
            baseline: None,
            samples: Vec::new(),
            captured: 0,
            evicted: 0,
        };
        let report = MemoryReport::build(context(&data, &config));
        assert_eq!(report.sample_count, 0);
        assert!(report.latest.is_none());
        assert!(!report.leak.suspected);
    }

    #[test]
    fn test_file_name_format() {
        let config = MemoryConfig::default();
        let data = session(&[100]);
        let report = MemoryReport::build(context(&data, &config));
        let name = report.file_name();

        assert!(name.starts_with("memory-report-"));
        assert!(name.ends_with(".json"));
        // memory-report- + YYYYMMDD-HHMMSS + - + 8 hex + .json
        assert_eq!(name.len(), "memory-report-".len() + 15 + 1 + 8 + 5);
    }

    #[tokio::test]
    async fn test_persist_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoryConfig {
            include_samples_in_report: true,
            ..MemoryConfig::default()
        };
        let data = session(&[100, 101, 102]);
        let report = MemoryReport::build(context(&data, &config));

        let path = report.persist(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["sample_count"], 3);
        assert_eq!(json["samples"].as_array().map(|s| s.len()), Some(3));
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let config = MemoryConfig::default();
        let data = session(&[100]);
        let report = MemoryReport::build(context(&data, &config));

        let err = report.persist(&blocker).await.unwrap_err();
        assert_eq!(err.code(), "persistence");
    }
}
