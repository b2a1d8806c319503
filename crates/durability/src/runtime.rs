//! Facilities a store runs on.

use crate::executor::{BlockingExecutor, BlockingPool, TokioBlocking};
use crate::shutdown::{ShutdownNotifier, ShutdownSignal};
use crate::timer::{Timer, TokioTimer};
use keystash_core::{StoreConfig, StoreResult};
use std::sync::Arc;

/// Blocking executor, timer, and shutdown signal shared by stores.
///
/// Cheap to clone; every store built from the same runtime shares the same
/// facilities.
#[derive(Clone)]
pub struct StoreRuntime {
    /// Runs disk I/O off the scheduler
    pub executor: Arc<dyn BlockingExecutor>,
    /// Arms debounce timers
    pub timer: Arc<dyn Timer>,
    /// Delivers the shutdown event
    pub shutdown: Arc<dyn ShutdownSignal>,
}

impl StoreRuntime {
    /// Assemble a runtime from explicit facilities.
    pub fn new(
        executor: Arc<dyn BlockingExecutor>,
        timer: Arc<dyn Timer>,
        shutdown: Arc<dyn ShutdownSignal>,
    ) -> Self {
        StoreRuntime {
            executor,
            timer,
            shutdown,
        }
    }

    /// Tokio's blocking pool and timers, with `notifier` for shutdown.
    pub fn tokio(notifier: ShutdownNotifier) -> Self {
        StoreRuntime::new(
            Arc::new(TokioBlocking::new()),
            Arc::new(TokioTimer::new()),
            Arc::new(notifier),
        )
    }

    /// A dedicated [`BlockingPool`] sized from `config`, Tokio timers, and
    /// `notifier` for shutdown.
    pub fn with_pool(config: &StoreConfig, notifier: ShutdownNotifier) -> StoreResult<Self> {
        config.validate()?;
        let pool = BlockingPool::from_config(config)?;
        Ok(StoreRuntime::new(
            Arc::new(pool),
            Arc::new(TokioTimer::new()),
            Arc::new(notifier),
        ))
    }
}

impl std::fmt::Debug for StoreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRuntime").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_blocking;
    use keystash_core::StoreError;

    #[tokio::test]
    async fn test_tokio_runtime_runs_jobs() {
        let runtime = StoreRuntime::tokio(ShutdownNotifier::new());
        let value = run_blocking(&*runtime.executor, || 7).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_pool_runtime_runs_jobs() {
        let config = StoreConfig::for_testing();
        let runtime = StoreRuntime::with_pool(&config, ShutdownNotifier::new()).unwrap();
        let value = run_blocking(&*runtime.executor, || "io").await.unwrap();
        assert_eq!(value, "io");
    }

    #[test]
    fn test_pool_runtime_validates_config() {
        let config = StoreConfig::default().with_worker_threads(0);
        let result = StoreRuntime::with_pool(&config, ShutdownNotifier::new());
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
