//! # Runtime
//!
//! Sizes the [Tokio](https://tokio.rs) runtime to the resources the process
//! is actually allowed to use.
//!
//! [`ProcLimits::detect`] reads the container CPU quota and memory ceiling
//! (cgroup v2, then v1, then the host). [`RuntimeConfig::from_limits`] turns
//! the CPU quota into a worker thread count, and the memory soft limit is
//! exposed for components that size caches or buffers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cmdkit_runtime::{ProcLimits, RuntimeConfig, build_runtime_with_config};
//!
//! let limits = ProcLimits::detect();
//! let runtime = build_runtime_with_config(&RuntimeConfig::from_limits(&limits))?;
//! runtime.block_on(async {
//!     tracing::info!(soft_limit = ?limits.memory_soft_limit(), "Running");
//! });
//! # Ok::<(), cmdkit_runtime::RuntimeError>(())
//! ```

mod error;
mod limits;

pub use crate::error::RuntimeError;
pub use crate::limits::{CpuQuota, DEFAULT_MEMORY_RATIO, LimitSource, MemoryLimit, ProcLimits};

use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

/// The default stack size for threads (3 `MiB`).
const DEFAULT_STACK_SIZE: usize = 3 * 1024 * 1024;
/// Minimum allowed stack size (1 `MiB`).
const MIN_STACK_SIZE: usize = 1024 * 1024;
/// Maximum allowed stack size (16 `MiB`).
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const MAX_WORKER_THREADS: usize = 1024;
/// How long an idle thread stays alive.
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "thread-worker";

/// Explicit worker count from `TOKIO_WORKER_THREADS`, which beats any detected quota.
fn worker_threads_override() -> Option<usize> {
    std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
}

fn validate_stack_size(stack_size: usize) -> usize {
    stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE)
}

fn normalize_config(config: &RuntimeConfig) -> RuntimeConfig {
    let thread_name = if config.thread_name.trim().is_empty() {
        DEFAULT_THREAD_NAME.to_owned()
    } else {
        config.thread_name.clone()
    };

    RuntimeConfig {
        worker_threads: config.worker_threads.clamp(1, MAX_WORKER_THREADS),
        stack_size: validate_stack_size(config.stack_size),
        thread_name,
        thread_keep_alive: config.thread_keep_alive,
    }
}

/// Configuration for the Tokio runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_limits(&ProcLimits::detect())
    }
}

impl RuntimeConfig {
    /// One worker per CPU granted by `limits`, unless `TOKIO_WORKER_THREADS` says otherwise.
    #[must_use]
    pub fn from_limits(limits: &ProcLimits) -> Self {
        let worker_threads = worker_threads_override().unwrap_or_else(|| limits.worker_threads());
        info!(
            worker_threads,
            cpu_quota = ?limits.cpu.map(|quota| quota.threads()),
            host_parallelism = limits.host_parallelism,
            memory_limit = ?limits.memory.map(|memory| memory.bytes),
            memory_soft_limit = ?limits.memory_soft_limit(),
            "Applying process limits"
        );

        Self {
            worker_threads,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }

    #[must_use = "Customize the number of worker threads for the runtime"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    #[must_use = "Customize the stack size for worker threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = validate_stack_size(size);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name = if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name };
        self
    }

    #[must_use = "Customize how long idle threads stay alive"]
    pub const fn with_thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.thread_keep_alive = keep_alive;
        self
    }
}

/// Creates a multi-threaded Tokio runtime with every driver enabled.
///
/// A failure here means the process cannot run with the requested
/// parallelism; callers should treat it as fatal.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime, RuntimeError> {
    let config = normalize_config(config);
    debug!(config = ?config, "Building tokio runtime");

    let mut builder = Builder::new_multi_thread();
    builder
        .worker_threads(config.worker_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive);

    builder.enable_all();

    builder.build().map_err(|source| RuntimeError::Build {
        source,
        context: Some(format!("{} worker threads", config.worker_threads).into()),
    })
}

/// Detects the process limits and builds a runtime sized to them.
pub fn build_limited_runtime() -> Result<(Runtime, ProcLimits), RuntimeError> {
    let limits = ProcLimits::detect();
    let runtime = build_runtime_with_config(&RuntimeConfig::from_limits(&limits))?;
    Ok((runtime, limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(threads: Option<u64>) -> ProcLimits {
        ProcLimits {
            cpu: threads.map(|n| CpuQuota {
                quota_us: n * 100_000,
                period_us: 100_000,
                source: LimitSource::CgroupV2,
            }),
            memory: None,
            host_parallelism: 8,
        }
    }

    #[test]
    fn test_worker_threads_validation() {
        let config = RuntimeConfig::from_limits(&limits(None)).with_worker_threads(0);
        assert_eq!(config.worker_threads, 1);

        let config = RuntimeConfig::from_limits(&limits(None)).with_worker_threads(2000);
        assert_eq!(config.worker_threads, MAX_WORKER_THREADS);
    }

    #[test]
    fn test_stack_size_validation() {
        let config = RuntimeConfig::from_limits(&limits(None)).with_stack_size(100);
        assert_eq!(config.stack_size, MIN_STACK_SIZE);

        let config = RuntimeConfig::from_limits(&limits(None)).with_stack_size(100 * 1024 * 1024);
        assert_eq!(config.stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn test_quota_sets_worker_threads() {
        if worker_threads_override().is_some() {
            return;
        }
        assert_eq!(RuntimeConfig::from_limits(&limits(Some(2))).worker_threads, 2);
        assert_eq!(RuntimeConfig::from_limits(&limits(None)).worker_threads, 8);
    }

    #[test]
    fn test_runtime_builds_with_limits() {
        let config = RuntimeConfig::from_limits(&limits(Some(2))).with_thread_name("limits-test");
        let runtime = build_runtime_with_config(&config).expect("runtime");
        assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
    }
}
