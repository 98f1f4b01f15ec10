use serde::Serialize;
use tokio::sync::broadcast;

use crate::analysis::LeakAssessment;
use crate::gc::CollectorEvent;
use crate::monitor::MemorySnapshot;
use crate::optimizer::OptimizationRun;

/// Events surfaced to the host for logging, alerting and metrics
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    Sample { snapshot: MemorySnapshot },
    Pressure {
        snapshot: MemorySnapshot,
        utilization: f64,
        threshold: f64,
    },
    Collector { event: CollectorEvent },
    Optimization { run: OptimizationRun },
    LeakSuspected { assessment: LeakAssessment },
}

impl MemoryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryEvent::Sample { .. } => "sample",
            MemoryEvent::Pressure { .. } => "pressure",
            MemoryEvent::Collector { .. } => "collector",
            MemoryEvent::Optimization { .. } => "optimization",
            MemoryEvent::LeakSuspected { .. } => "leak_suspected",
        }
    }
}

/// Broadcast fan-out of memory events. Publishing without subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MemoryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: MemoryEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
