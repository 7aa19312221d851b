//! The dispatch executor.
//!
//! Synchronous handler bodies run on a fixed pool of worker threads owned by
//! a [`Dispatcher`], away from the threads that accept connections. The pool
//! is a dedicated multi-threaded Tokio runtime; a blocking body occupies one
//! of its workers until it returns.

use sluice_core::{ActionError, ActionResult};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Handle, Runtime};
use tracing::debug;

/// Default number of workers per available CPU core.
pub const DEFAULT_WORKERS_PER_CORE: usize = 2;

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME: &str = "sluice-dispatch";

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{n}`.
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            threads: available_cores() * DEFAULT_WORKERS_PER_CORE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Size the pool as `available cores * workers_per_core`.
    pub fn with_workers_per_core(self, workers_per_core: usize) -> Self {
        self.with_threads(available_cores() * workers_per_core)
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

struct PoolRuntime {
    runtime: Option<Runtime>,
}

impl Drop for PoolRuntime {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async code.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// A fixed-size worker pool for handler bodies.
///
/// Cloning shares the pool. The worker threads stop once the last clone is
/// dropped; tasks still queued at that point are cancelled.
///
/// # Example
///
/// ```
/// use sluice_actions::{Dispatcher, DispatcherConfig};
///
/// let pool = Dispatcher::with_config(DispatcherConfig::new().with_threads(2)).unwrap();
/// assert_eq!(pool.size(), 2);
///
/// # tokio_test::block_on(async {
/// let sum = pool.run(|| 40 + 2).await.unwrap();
/// assert_eq!(sum, 42);
/// # });
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    config: Arc<DispatcherConfig>,
    _runtime: Arc<PoolRuntime>,
}

static GLOBAL: OnceLock<Result<Dispatcher, String>> = OnceLock::new();

impl Dispatcher {
    /// Creates a pool with the default configuration.
    pub fn new() -> std::io::Result<Self> {
        Self::with_config(DispatcherConfig::default())
    }

    /// Creates a pool with the given configuration.
    pub fn with_config(config: DispatcherConfig) -> std::io::Result<Self> {
        let threads = config.threads.max(1);
        let prefix = config.thread_name.clone();
        let counter = AtomicUsize::new(0);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name_fn(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                format!("{prefix}-{n}")
            })
            .enable_all()
            .build()?;

        debug!(threads, name = %config.thread_name, "dispatch pool started");

        Ok(Self {
            handle: runtime.handle().clone(),
            config: Arc::new(DispatcherConfig { threads, ..config }),
            _runtime: Arc::new(PoolRuntime {
                runtime: Some(runtime),
            }),
        })
    }

    /// Returns the process-wide pool, creating it on first use.
    pub fn global() -> ActionResult<&'static Self> {
        GLOBAL
            .get_or_init(|| Self::new().map_err(|err| err.to_string()))
            .as_ref()
            .map_err(|message| ActionError::dispatch(message.clone()))
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.config.threads
    }

    /// Worker thread name prefix.
    pub fn thread_name(&self) -> &str {
        &self.config.thread_name
    }

    /// Runs a blocking closure on a worker.
    ///
    /// A panic in `f` becomes [`ActionError::Panicked`].
    pub fn run<F, T>(&self, f: F) -> impl Future<Output = ActionResult<T>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(async move { f() })
    }

    /// Runs a future on the pool.
    pub fn spawn<Fut>(&self, fut: Fut) -> impl Future<Output = ActionResult<Fut::Output>> + Send + 'static
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        metrics::counter!("sluice_dispatch_tasks_total").increment(1);
        let task = self.handle.spawn(fut);
        async move {
            task.await.map_err(|err| {
                if err.is_panic() {
                    ActionError::panicked(err.into_panic().as_ref())
                } else {
                    ActionError::dispatch("task was cancelled")
                }
            })
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("threads", &self.config.threads)
            .field("thread_name", &self.config.thread_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool() -> Dispatcher {
        Dispatcher::with_config(
            DispatcherConfig::new()
                .with_threads(2)
                .with_thread_name("test-pool"),
        )
        .unwrap()
    }

    #[test]
    fn test_default_size_scales_with_cores() {
        let config = DispatcherConfig::default();
        assert_eq!(config.threads, available_cores() * DEFAULT_WORKERS_PER_CORE);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn test_zero_threads_is_clamped() {
        assert_eq!(DispatcherConfig::new().with_threads(0).threads, 1);
    }

    #[tokio::test]
    async fn test_runs_on_named_worker() {
        let pool = small_pool();
        let name = pool
            .run(|| std::thread::current().name().map(ToString::to_string))
            .await
            .unwrap()
            .unwrap();
        assert!(name.starts_with("test-pool-"), "unexpected thread name {name}");
        assert_ne!(std::thread::current().name(), Some(name.as_str()));
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let pool = small_pool();
        let err = pool.run(|| -> u8 { panic!("worker exploded") }).await.unwrap_err();
        assert!(matches!(err, ActionError::Panicked { ref message } if message == "worker exploded"));
    }

    #[tokio::test]
    async fn test_pool_can_be_dropped_inside_async_code() {
        let pool = small_pool();
        assert_eq!(pool.spawn(async { 5 }).await.unwrap(), 5);
        drop(pool);
    }

    #[tokio::test]
    async fn test_global_pool_is_shared() {
        let a = Dispatcher::global().unwrap();
        let b = Dispatcher::global().unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(a.size() >= 1);
    }
}
