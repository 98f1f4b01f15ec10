use std::sync::Mutex;
use sysinfo::{Pid, System};
use tracing::debug;

use super::allocator;
use super::snapshot::DetailedStats;

const PROC_STATUS_PATH: &str = "/proc/self/status";

/// Raw counters from one probe read; `None` marks a counter that could not be read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReading {
    pub rss: Option<u64>,
    pub heap_total: Option<u64>,
    pub heap_used: Option<u64>,
    pub external: Option<u64>,
    pub errors: Vec<String>,
}

/// Source of process memory counters
pub trait MemoryProbe: Send + Sync {
    fn read(&self) -> ProbeReading;

    /// Extended diagnostics; `None` when the platform offers none
    fn read_details(&self) -> Option<DetailedStats> {
        None
    }
}

/// Memory fields of `/proc/self/status`, in bytes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStatus {
    pub vm_rss: Option<u64>,
    pub vm_data: Option<u64>,
    pub rss_anon: Option<u64>,
    pub rss_file: Option<u64>,
    pub rss_shmem: Option<u64>,
}

impl ProcStatus {
    /// Parses `/proc/<pid>/status` content; unknown or malformed lines are skipped
    pub fn parse(content: &str) -> Self {
        let mut status = Self::default();
        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let slot = match key.trim() {
                "VmRSS" => &mut status.vm_rss,
                "VmData" => &mut status.vm_data,
                "RssAnon" => &mut status.rss_anon,
                "RssFile" => &mut status.rss_file,
                "RssShmem" => &mut status.rss_shmem,
                _ => continue,
            };
            *slot = rest
                .split_whitespace()
                .next()
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb.saturating_mul(1024));
        }
        status
    }

    pub fn read() -> std::io::Result<Self> {
        std::fs::read_to_string(PROC_STATUS_PATH).map(|content| Self::parse(&content))
    }

    /// File-backed plus shared resident memory
    pub fn external(&self) -> Option<u64> {
        match (self.rss_file, self.rss_shmem) {
            (Some(file), Some(shmem)) => Some(file + shmem),
            (Some(file), None) => Some(file),
            _ => None,
        }
    }
}

/// Probe for the current process.
///
/// heap_used comes from the tracking allocator when installed, otherwise
/// from resident anonymous memory; heap_total is `max_heap_size` when set,
/// otherwise the data segment size.
pub struct ProcessProbe {
    max_heap_size: Option<u64>,
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessProbe {
    pub fn new(max_heap_size: Option<u64>) -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| debug!("Current pid unavailable: {}", e))
            .ok();
        Self {
            max_heap_size,
            pid,
            system: Mutex::new(System::new()),
        }
    }

    fn refresh_process<R>(&self, read: impl FnOnce(&sysinfo::Process) -> R) -> Option<R> {
        let pid = self.pid?;
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(read)
    }
}

impl MemoryProbe for ProcessProbe {
    fn read(&self) -> ProbeReading {
        let mut reading = ProbeReading::default();

        match ProcStatus::read() {
            Ok(status) => {
                reading.rss = status.vm_rss;
                reading.heap_used = allocator::live_bytes().or(status.rss_anon);
                reading.heap_total = self.max_heap_size.or(status.vm_data);
                reading.external = status.external();
            }
            Err(err) => {
                // Non-Linux or sandboxed: fall back to sysinfo for what it offers
                reading.errors.push(format!("{}: {}", PROC_STATUS_PATH, err));
                if let Some((rss, virt)) = self.refresh_process(|p| (p.memory(), p.virtual_memory())) {
                    reading.rss = Some(rss);
                    reading.heap_total = self.max_heap_size.or(Some(virt));
                } else {
                    reading.heap_total = self.max_heap_size;
                    reading.errors.push("process statistics unavailable".to_string());
                }
                reading.heap_used = allocator::live_bytes().or(reading.rss);
                reading.errors.push("external memory unavailable".to_string());
            }
        }

        reading
    }

    fn read_details(&self) -> Option<DetailedStats> {
        let mut details = DetailedStats {
            allocator: allocator::stats(),
            ..Default::default()
        };

        match self.refresh_process(|p| (p.run_time(), p.cpu_usage(), p.virtual_memory())) {
            Some((uptime, cpu, virt)) => {
                details.uptime_secs = Some(uptime);
                details.cpu_usage_percent = Some(cpu);
                details.virtual_memory = Some(virt);
            }
            None => details.unavailable.push("process".to_string()),
        }

        if details.allocator.is_none() {
            details.unavailable.push("allocator".to_string());
        }

        Some(details)
    }
}
