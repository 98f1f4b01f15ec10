use tracing::debug;

/// Forced-collection capability injected at construction.
///
/// Implementations must be best-effort: a runtime that cannot act on the
/// request returns `false` rather than failing.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    /// Request one collection cycle; returns whether anything was done
    fn collect(&self) -> bool;
}

/// Returns free heap pages to the OS through glibc's `malloc_trim`
#[derive(Debug, Default, Clone, Copy)]
pub struct MallocTrimCollector;

impl MallocTrimCollector {
    pub fn new() -> Self {
        Self
    }

    /// Whether this build can call `malloc_trim` at all
    pub fn supported() -> bool {
        cfg!(all(target_os = "linux", target_env = "gnu"))
    }
}

impl Collector for MallocTrimCollector {
    fn name(&self) -> &str {
        "malloc_trim"
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn collect(&self) -> bool {
        // SAFETY: malloc_trim only walks allocator-internal free lists.
        let released = unsafe { libc::malloc_trim(0) };
        debug!("malloc_trim released memory: {}", released != 0);
        true
    }

    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    fn collect(&self) -> bool {
        debug!("malloc_trim not available on this target");
        false
    }
}

/// Adapts a closure into a collector, for hosts with their own reclaim hook
pub struct FnCollector<F> {
    name: String,
    hook: F,
}

impl<F> FnCollector<F>
where
    F: Fn() -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, hook: F) -> Self {
        Self { name: name.into(), hook }
    }
}

impl<F> Collector for FnCollector<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> bool {
        (self.hook)()
    }
}
