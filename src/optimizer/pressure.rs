use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::run::{CapabilityStatus, OptimizationRun, PassKind, PassTrigger};
use crate::cache::CacheRegistry;
use crate::config::defaults::{DEFAULT_TRIM_FRACTION, OPTIMIZATION_HISTORY_LIMIT};
use crate::config::MemoryConfig;
use crate::gc::{CollectorEvent, InstrumentedCollector};
use crate::memory::events::{EventBus, MemoryEvent};
use crate::monitor::MemorySnapshot;
use crate::pool::PoolRegistry;

const IDLE: u8 = 0;
const NORMAL: u8 = 1;
const AGGRESSIVE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSettings {
    pub threshold: f64,
    pub aggressive_cycles: u32,
    pub cycle_pause: Duration,
    pub trim_fraction: f64,
}

impl PressureSettings {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            threshold: config.gc_threshold_ratio,
            aggressive_cycles: config.aggressive_collection_cycles,
            cycle_pause: config.aggressive_cycle_pause(),
            trim_fraction: DEFAULT_TRIM_FRACTION,
        }
    }
}

/// RAII guard for the single in-flight pass
struct PassGuard {
    state: Arc<AtomicU8>,
}

impl PassGuard {
    fn try_acquire(state: &Arc<AtomicU8>, kind: PassKind) -> Option<Self> {
        let value = match kind {
            PassKind::Normal => NORMAL,
            PassKind::Aggressive => AGGRESSIVE,
        };
        state
            .compare_exchange(IDLE, value, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { state: Arc::clone(state) })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

/// Decides between normal and aggressive reclaim passes from heap utilization
/// and collector events.
///
/// Passes never overlap: a trigger arriving while a pass runs is skipped.
/// A collector cycle that leaves utilization above threshold during a normal
/// pass escalates to one aggressive pass right after it.
pub struct PressureMonitor<V> {
    pools: Arc<PoolRegistry>,
    caches: Arc<CacheRegistry<V>>,
    collector: Option<Arc<InstrumentedCollector>>,
    events: EventBus,
    settings: PressureSettings,
    state: Arc<AtomicU8>,
    escalate: AtomicBool,
    history: Mutex<VecDeque<OptimizationRun>>,
}

impl<V: Clone + Send + 'static> PressureMonitor<V> {
    pub fn new(
        pools: Arc<PoolRegistry>,
        caches: Arc<CacheRegistry<V>>,
        collector: Option<Arc<InstrumentedCollector>>,
        events: EventBus,
        settings: PressureSettings,
    ) -> Self {
        Self {
            pools,
            caches,
            collector,
            events,
            settings,
            state: Arc::new(AtomicU8::new(IDLE)),
            escalate: AtomicBool::new(false),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.settings.threshold
    }

    pub fn collector_status(&self) -> CapabilityStatus {
        if self.collector.is_some() {
            CapabilityStatus::Available
        } else {
            CapabilityStatus::Unavailable
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Evaluate a fresh sample; runs a normal pass (and an escalation) when above threshold
    pub async fn check_sample(&self, snapshot: &MemorySnapshot) -> Vec<OptimizationRun> {
        let Some(utilization) = snapshot.heap_utilization() else {
            return Vec::new();
        };
        if utilization <= self.settings.threshold {
            return Vec::new();
        }

        warn!(
            "Memory pressure: heap utilization {:.1}% above threshold {:.1}%",
            utilization * 100.0,
            self.settings.threshold * 100.0
        );
        self.events.publish(MemoryEvent::Pressure {
            snapshot: snapshot.clone(),
            utilization,
            threshold: self.settings.threshold,
        });

        self.relieve(PassTrigger::Sample, Some(utilization)).await
    }

    /// Feed a collector event produced outside a pass
    pub async fn on_collector_event(&self, event: &CollectorEvent) -> Option<OptimizationRun> {
        self.events.publish(MemoryEvent::Collector { event: event.clone() });

        let utilization = event.utilization_after.filter(|u| *u > self.settings.threshold)?;
        match self.state.load(Ordering::Acquire) {
            IDLE => self.aggressive_pass(PassTrigger::CollectorEvent, Some(utilization)).await,
            NORMAL => {
                self.escalate.store(true, Ordering::Release);
                None
            }
            _ => None,
        }
    }

    /// Manual normal pass regardless of utilization
    pub async fn optimize(&self, utilization: Option<f64>) -> Vec<OptimizationRun> {
        self.relieve(PassTrigger::Manual, utilization).await
    }

    async fn relieve(&self, trigger: PassTrigger, utilization: Option<f64>) -> Vec<OptimizationRun> {
        let mut runs = Vec::new();
        let Some(run) = self.normal_pass(trigger, utilization) else {
            return runs;
        };
        let after = run.utilization;
        runs.push(run);

        if self.escalate.swap(false, Ordering::AcqRel) {
            if let Some(run) = self.aggressive_pass(PassTrigger::CollectorEvent, after).await {
                runs.push(run);
            }
        }
        runs
    }

    fn normal_pass(&self, trigger: PassTrigger, utilization: Option<f64>) -> Option<OptimizationRun> {
        let Some(_guard) = PassGuard::try_acquire(&self.state, PassKind::Normal) else {
            debug!("Optimization pass already in progress, skipping normal pass");
            return None;
        };
        self.escalate.store(false, Ordering::Release);

        let started = Instant::now();
        let mut run = OptimizationRun::new(PassKind::Normal, trigger, utilization);
        run.cache_entries_cleared = self.caches.purge_all();
        run.pool_objects_trimmed = self.pools.trim_all(self.settings.trim_fraction);

        if let Some(collector) = &self.collector {
            run.collector = CapabilityStatus::Available;
            run.collector_cycles_requested = 1;
            let event = collector.collect();
            if event.performed {
                run.collector_cycles_performed = 1;
            }
            self.observe(&event);
            if let Some(after) = event.utilization_after {
                run.utilization = Some(after);
            }
        }
        run.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Normal optimization pass: purged {} cache entries, trimmed {} pooled objects",
            run.cache_entries_cleared, run.pool_objects_trimmed
        );
        self.record(run.clone());
        Some(run)
    }

    async fn aggressive_pass(&self, trigger: PassTrigger, utilization: Option<f64>) -> Option<OptimizationRun> {
        let Some(_guard) = PassGuard::try_acquire(&self.state, PassKind::Aggressive) else {
            debug!("Optimization pass already in progress, skipping aggressive pass");
            return None;
        };

        let started = Instant::now();
        let mut run = OptimizationRun::new(PassKind::Aggressive, trigger, utilization);
        run.cache_entries_cleared = self.caches.clear_all();
        run.pool_objects_trimmed = self.pools.trim_all(self.settings.trim_fraction);

        if let Some(collector) = &self.collector {
            run.collector = CapabilityStatus::Available;
            for cycle in 0..self.settings.aggressive_cycles {
                if cycle > 0 {
                    tokio::time::sleep(self.settings.cycle_pause).await;
                }
                let event = collector.collect();
                run.collector_cycles_requested += 1;
                if event.performed {
                    run.collector_cycles_performed += 1;
                }
                self.observe(&event);
            }
        }
        run.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        warn!(
            "Aggressive optimization pass: cleared {} cache entries, trimmed {} pooled objects, {} collector cycles",
            run.cache_entries_cleared, run.pool_objects_trimmed, run.collector_cycles_requested
        );
        self.record(run.clone());
        Some(run)
    }

    // Events from inside a pass; only a normal pass can escalate
    fn observe(&self, event: &CollectorEvent) {
        self.events.publish(MemoryEvent::Collector { event: event.clone() });
        let above = event.utilization_after.is_some_and(|u| u > self.settings.threshold);
        if above && self.state.load(Ordering::Acquire) == NORMAL {
            self.escalate.store(true, Ordering::Release);
        }
    }

    fn record(&self, run: OptimizationRun) {
        self.events.publish(MemoryEvent::Optimization { run: run.clone() });
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() >= OPTIMIZATION_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(run);
    }

    pub fn history(&self) -> Vec<OptimizationRun> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
