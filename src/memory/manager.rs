use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::{MemoryError, MemoryResult};
use super::events::{EventBus, MemoryEvent};
use crate::cache::{CacheRegistry, CacheStats};
use crate::config::defaults::EVENT_CHANNEL_CAPACITY;
use crate::config::MemoryConfig;
use crate::gc::{Collector, CollectorEvent, InstrumentedCollector};
use crate::monitor::{allocator, MemoryProbe, MemorySampler, MemorySnapshot, ProcessProbe, SessionData};
use crate::optimizer::{CapabilityStatus, OptimizationRun, PressureMonitor, PressureSettings};
use crate::pool::{InternStats, Pool, PoolRegistry, PoolStats, Poolable};
use crate::report::{Capabilities, MemoryReport, ReportContext};

#[derive(Debug, Clone, Serialize)]
pub struct CollectorSummary {
    pub status: CapabilityStatus,
    pub name: Option<String>,
    pub cycles: u64,
    pub last_event: Option<CollectorEvent>,
}

/// Current snapshot plus pool, cache and collector summaries
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub snapshot: MemorySnapshot,
    pub utilization: Option<f64>,
    pub running: bool,
    pub session_id: Option<Uuid>,
    pub sample_count: usize,
    pub pools: Vec<PoolStats>,
    pub interning: InternStats,
    pub caches: Vec<CacheStats>,
    pub collector: CollectorSummary,
    pub optimization_runs: usize,
    pub event_subscribers: usize,
}

struct Lifecycle {
    session_id: Option<Uuid>,
    task: Option<JoinHandle<()>>,
}

/// Resource-lifecycle facade held by the host: pools, caches, sampling,
/// pressure handling and reporting.
///
/// Construct one per process (or per test) and share it as `Arc`.
pub struct ResourceManager {
    config: MemoryConfig,
    pools: Arc<PoolRegistry>,
    caches: Arc<CacheRegistry<Value>>,
    sampler: MemorySampler,
    collector: Option<Arc<InstrumentedCollector>>,
    pressure: PressureMonitor<Value>,
    events: EventBus,
    lifecycle: Mutex<Lifecycle>,
}

impl ResourceManager {
    pub fn new(config: MemoryConfig) -> MemoryResult<Self> {
        Self::with_probe(config, None, None)
    }

    pub fn with_collector(config: MemoryConfig, collector: Arc<dyn Collector>) -> MemoryResult<Self> {
        Self::with_probe(config, None, Some(collector))
    }

    /// Full constructor; `probe` defaults to the current-process probe
    pub fn with_probe(
        config: MemoryConfig,
        probe: Option<Arc<dyn MemoryProbe>>,
        collector: Option<Arc<dyn Collector>>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.output_directory).map_err(|e| {
            MemoryError::config(format!(
                "Output directory {} is not usable: {}",
                config.output_directory.display(),
                e
            ))
        })?;

        let probe = probe.unwrap_or_else(|| Arc::new(ProcessProbe::new(config.max_heap_size)));
        let pools = Arc::new(PoolRegistry::new(&config));
        let caches = Arc::new(CacheRegistry::new(&config.cache_categories, config.caching_enabled));
        let collector = collector.map(|hook| Arc::new(InstrumentedCollector::new(hook, Arc::clone(&probe))));
        let events = EventBus::new(EVENT_CHANNEL_CAPACITY);

        let pressure = PressureMonitor::new(
            Arc::clone(&pools),
            Arc::clone(&caches),
            collector.clone(),
            events.clone(),
            PressureSettings::from_config(&config),
        );
        let sampler = MemorySampler::new(probe, config.max_samples, config.detailed_stats);

        info!(
            "Resource manager ready: {} pools, {} cache categories, collector {}",
            pools.names().len(),
            caches.categories().len(),
            collector.as_ref().map(|c| c.name().to_string()).unwrap_or_else(|| "unavailable".to_string())
        );

        Ok(Self {
            config,
            pools,
            caches,
            sampler,
            collector,
            pressure,
            events,
            lifecycle: Mutex::new(Lifecycle { session_id: None, task: None }),
        })
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle().task.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lifecycle().session_id
    }

    // Pools

    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    pub fn register_pool<T: Poolable>(&self, name: &str, max_size: Option<usize>) -> MemoryResult<Arc<Pool<T>>> {
        self.pools.register_pool(name, max_size)
    }

    pub fn acquire<T: Poolable>(&self, pool: &str, size_hint: usize) -> MemoryResult<T> {
        self.pools.acquire(pool, size_hint)
    }

    /// Returns whether the instance went back to the pool
    pub fn release<T: Poolable>(&self, pool: &str, value: T) -> MemoryResult<bool> {
        self.pools.release(pool, value)
    }

    pub fn acquire_buffer(&self, size: usize) -> Vec<u8> {
        self.pools.buffers().acquire(size)
    }

    pub fn release_buffer(&self, buffer: Vec<u8>) -> bool {
        self.pools.buffers().release(buffer)
    }

    pub fn acquire_string(&self, capacity: usize) -> String {
        self.pools.strings().acquire(capacity)
    }

    pub fn release_string(&self, value: String) -> bool {
        self.pools.strings().release(value)
    }

    pub fn intern(&self, value: &str) -> Arc<str> {
        self.pools.intern(value)
    }

    // Caches

    pub fn caches(&self) -> &Arc<CacheRegistry<Value>> {
        &self.caches
    }

    pub fn cache_set(&self, category: &str, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> bool {
        self.caches.set(category, key, value, ttl)
    }

    pub fn cache_get(&self, category: &str, key: &str) -> Option<Value> {
        self.caches.get(category, key)
    }

    pub fn cache_delete(&self, category: &str, key: &str) -> bool {
        self.caches.delete(category, key)
    }

    pub fn cache_clear(&self, category: &str) -> usize {
        self.caches.clear(category)
    }

    pub fn cache_purge(&self, category: &str) -> usize {
        self.caches.purge(category)
    }

    // Lifecycle

    /// Begin a profiling session. Returns false when already running or monitoring is disabled.
    pub fn start(self: &Arc<Self>) -> bool {
        self.start_with_interval(self.config.sampling_interval())
    }

    /// Like `start`, sampling every `period` instead of the configured interval
    pub fn start_with_interval(self: &Arc<Self>, period: Duration) -> bool {
        if period.is_zero() {
            warn!("Sampling interval must be greater than 0, not starting sampler");
            return false;
        }
        if !self.config.monitoring_enabled {
            info!("Memory monitoring disabled, not starting sampler");
            return false;
        }

        let mut lifecycle = self.lifecycle();
        if lifecycle.task.is_some() {
            warn!("Memory sampler already running, ignoring start");
            return false;
        }

        let session_id = Uuid::new_v4();
        let baseline = self.capture(Some("baseline"));
        self.sampler.begin(session_id, baseline);

        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                manager.tick(session_id).await;
            }
        });

        lifecycle.session_id = Some(session_id);
        lifecycle.task = Some(task);
        info!("Memory sampling started (session {}, every {:?})", session_id, period);
        true
    }

    async fn tick(&self, session_id: Uuid) {
        let snapshot = self.capture(None);
        let Some(captured) = self.sampler.record(session_id, snapshot.clone()) else {
            debug!("Session {} already ended, dropping sample", session_id);
            return;
        };
        debug!("Captured memory sample #{}", captured);
        self.events.publish(MemoryEvent::Sample { snapshot: snapshot.clone() });

        if let Some(assessment) = self.sampler.check_leak(self.config.leak_window) {
            warn!(
                "Possible memory leak: heap usage rose {} bytes across the last {} samples",
                assessment.growth_bytes, assessment.window
            );
            self.events.publish(MemoryEvent::LeakSuspected { assessment });
        }

        self.pressure.check_sample(&snapshot).await;
    }

    /// End the session and produce the final report. Repeat calls return `None`.
    ///
    /// The session is closed before the first await, so a `start()` racing this
    /// call opens a fresh session, and dropping the returned future still leaves
    /// the manager stopped with its report being written.
    pub async fn stop(&self) -> Option<MemoryReport> {
        let (task, session_id, session) = {
            let mut lifecycle = self.lifecycle();
            let Some(task) = lifecycle.task.take() else {
                debug!("Memory sampler not running, ignoring stop");
                return None;
            };
            task.abort();
            let session_id = lifecycle.session_id.take().unwrap_or_else(Uuid::new_v4);
            let session = self.sampler.finish(session_id).unwrap_or_else(|| self.sampler.data());
            (task, session_id, session)
        };
        info!("Memory sampling stopped (session {})", session_id);

        let report = self.build_report(session_id, &session);
        let persist = self.spawn_publish(report.clone());

        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!("Memory sampling task failed: {}", e);
            }
        }
        if let Err(e) = persist.await {
            error!("Memory report task failed: {}", e);
        }
        Some(report)
    }

    /// Wait for Ctrl-C or SIGTERM, then stop
    pub async fn stop_on_signal(&self) -> Option<MemoryReport> {
        shutdown_signal().await;
        info!("Shutdown signal received");
        self.stop().await
    }

    // Reporting

    pub fn capture(&self, label: Option<&str>) -> MemorySnapshot {
        self.sampler.capture(label, Some(self.pools.buffer_bytes()))
    }

    pub fn get_memory_stats(&self) -> MemoryStats {
        let snapshot = self.capture(Some("stats"));
        let (running, session_id) = {
            let lifecycle = self.lifecycle();
            (lifecycle.task.is_some(), lifecycle.session_id)
        };

        MemoryStats {
            utilization: snapshot.heap_utilization(),
            snapshot,
            running,
            session_id,
            sample_count: self.sampler.sample_count(),
            pools: self.pools.stats(),
            interning: self.pools.intern_stats(),
            caches: self.caches.stats(),
            collector: CollectorSummary {
                status: self.pressure.collector_status(),
                name: self.collector.as_ref().map(|c| c.name().to_string()),
                cycles: self.collector.as_ref().map(|c| c.count()).unwrap_or(0),
                last_event: self.collector.as_ref().and_then(|c| c.last_event()),
            },
            optimization_runs: self.pressure.history().len(),
            event_subscribers: self.events.subscriber_count(),
        }
    }

    /// Build, persist and log a report for the current session
    pub async fn generate_report(&self) -> MemoryReport {
        let session_id = self.session_id().unwrap_or_else(Uuid::new_v4);
        let report = self.build_report(session_id, &self.sampler.data());
        if let Err(e) = self.spawn_publish(report.clone()).await {
            error!("Memory report task failed: {}", e);
        }
        report
    }

    fn build_report(&self, session_id: Uuid, session: &SessionData) -> MemoryReport {
        let collector_events = self.collector.as_ref().map(|c| match session.started_at {
            Some(start) => c.events_since(start),
            None => c.events(),
        });

        let detailed = session.samples.iter().any(|s| s.details.is_some())
            || session.baseline.as_ref().is_some_and(|b| b.details.is_some());

        MemoryReport::build(ReportContext {
            session_id,
            session,
            capture_failures: self.sampler.capture_failures(),
            collector_events: collector_events.as_deref(),
            optimizations: self.pressure.history(),
            pools: self.pools.stats(),
            interning: self.pools.intern_stats(),
            caches: self.caches.stats(),
            capabilities: Capabilities {
                collector: self.pressure.collector_status(),
                detailed_stats: availability(detailed),
                allocator_tracking: availability(allocator::is_installed()),
            },
            config: &self.config,
        })
    }

    /// Log and persist on a separate task so the write outlives a cancelled caller
    fn spawn_publish(&self, report: MemoryReport) -> JoinHandle<()> {
        let directory = self.config.output_directory.clone();
        tokio::spawn(async move {
            report.log_summary();
            match report.persist(&directory).await {
                Ok(path) => info!("Memory report written to {}", path.display()),
                Err(e) => error!("Failed to persist memory report: {}", e),
            }
        })
    }

    // Reclaim

    /// Request one collector cycle and feed it to the pressure monitor
    pub async fn collect(&self) -> MemoryResult<CollectorEvent> {
        let collector = self.collector.as_ref().ok_or_else(|| MemoryError::CapabilityUnavailable {
            capability: "collector".to_string(),
        })?;
        let event = collector.collect();
        self.pressure.on_collector_event(&event).await;
        Ok(event)
    }

    /// Run a normal reclaim pass now, regardless of utilization
    pub async fn optimize(&self) -> Vec<OptimizationRun> {
        let utilization = self.capture(Some("optimize")).heap_utilization();
        self.pressure.optimize(utilization).await
    }

    pub fn optimization_history(&self) -> Vec<OptimizationRun> {
        self.pressure.history()
    }
}

fn availability(available: bool) -> CapabilityStatus {
    if available {
        CapabilityStatus::Available
    } else {
        CapabilityStatus::Unavailable
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ProbeReading;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingProbe {
        reads: AtomicU64,
    }

    impl MemoryProbe for CountingProbe {
        fn read(&self) -> ProbeReading {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            ProbeReading {
                rss: Some(1000 + n),
                heap_total: Some(10_000),
                heap_used: Some(1000 + n),
                external: Some(0),
                errors: Vec::new(),
            }
        }
    }

    fn manager(dir: &std::path::Path) -> Arc<ResourceManager> {
        let config = MemoryConfig {
            output_directory: dir.to_path_buf(),
            sampling_interval_ms: 100,
            ..MemoryConfig::default()
        };
        let probe: Arc<dyn MemoryProbe> = Arc::new(CountingProbe { reads: AtomicU64::new(0) });
        Arc::new(ResourceManager::with_probe(config, Some(probe), None).unwrap())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MemoryConfig {
            sampling_interval_ms: 0,
            ..MemoryConfig::default()
        };
        let err = ResourceManager::new(config).err().unwrap();
        assert_eq!(err.code(), "configuration");
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(manager.cache_set("query", "q1", json!({"hits": 3}), None));
        assert_eq!(manager.cache_get("query", "q1"), Some(json!({"hits": 3})));
        assert!(!manager.cache_set("missing", "q1", json!(1), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampling_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        assert!(manager.start());
        assert!(!manager.start());
        tokio::time::sleep(Duration::from_millis(1050)).await;

        let samples = manager.sampler.sample_count();
        assert!((9..=11).contains(&samples), "captured {} samples", samples);
        assert!(manager.sampler.baseline().is_some());

        let report = manager.stop().await.unwrap();
        assert_eq!(report.sample_count, samples);
        assert!(report.baseline.is_some());
        assert!(manager.stop().await.is_none());
        assert!(!manager.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_interval_override() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        assert!(!manager.start_with_interval(Duration::ZERO));
        assert!(manager.start_with_interval(Duration::from_millis(250)));
        tokio::time::sleep(Duration::from_millis(1050)).await;

        let report = manager.stop().await.unwrap();
        assert_eq!(report.sample_count, 4);
    }

    #[tokio::test]
    async fn test_collect_without_hook_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let err = manager.collect().await.unwrap_err();
        assert_eq!(err.code(), "capability_unavailable");
    }
}
