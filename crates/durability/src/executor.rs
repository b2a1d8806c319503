//! Blocking-call execution.
//!
//! Disk I/O never runs on the async scheduler. Jobs are handed to a
//! [`BlockingExecutor`] and the calling task suspends on
//! [`run_blocking`] until the job's result comes back.
//!
//! Two executors are provided:
//! - [`BlockingPool`]: a fixed pool of worker threads with a bounded FIFO queue
//! - [`TokioBlocking`]: Tokio's own blocking thread pool

use keystash_core::{StoreConfig, StoreError, StoreResult};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::error;

/// Unit of blocking work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Error returned when a job cannot be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The queue is at capacity.
    #[error("blocking pool queue is full")]
    QueueFull,
    /// The executor has been shut down.
    #[error("blocking pool has been shut down")]
    ShutDown,
    /// No Tokio runtime is available to run the job.
    #[error("no Tokio runtime available for blocking job")]
    NoRuntime,
}

/// Executes jobs off the async scheduler.
pub trait BlockingExecutor: Send + Sync {
    /// Queue a job. The job runs at most once.
    fn submit(&self, job: Job) -> Result<(), SubmitError>;
}

/// Run `f` on `executor` and wait for its result.
///
/// A job that panics or is dropped without running surfaces as
/// [`StoreError::Executor`].
pub async fn run_blocking<E, F, R>(executor: &E, f: F) -> StoreResult<R>
where
    E: BlockingExecutor + ?Sized,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    executor
        .submit(Box::new(move || {
            let _ = tx.send(f());
        }))
        .map_err(|e| StoreError::executor(e.to_string()))?;

    rx.await
        .map_err(|_| StoreError::executor("blocking job did not complete"))
}

/// Pool metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of jobs waiting in the queue.
    pub queue_depth: usize,
    /// Number of jobs currently being executed by workers.
    pub active_jobs: usize,
    /// Total number of jobs completed since pool creation.
    pub jobs_completed: u64,
    /// Number of worker threads.
    pub worker_count: usize,
}

struct PoolInner {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    active_jobs: AtomicUsize,
    max_queue_depth: usize,
    jobs_completed: AtomicU64,
}

/// A bounded pool of worker threads for blocking I/O.
///
/// Jobs run in submission order. Submitting to a full queue fails fast with
/// [`SubmitError::QueueFull`] instead of blocking the scheduler.
pub struct BlockingPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl BlockingPool {
    /// Create a new pool with the given number of worker threads.
    ///
    /// Workers are named `keystash-io-0`, `keystash-io-1`, etc.
    pub fn new(num_threads: usize, max_queue_depth: usize) -> io::Result<Self> {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            active_jobs: AtomicUsize::new(0),
            max_queue_depth,
            jobs_completed: AtomicU64::new(0),
        });

        let pool = Self {
            inner,
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for i in 0..num_threads {
            let inner_clone = Arc::clone(&pool.inner);
            let handle = std::thread::Builder::new()
                .name(format!("keystash-io-{}", i))
                .spawn(move || worker_loop(&inner_clone))?;
            pool.workers.lock().push(handle);
        }

        Ok(pool)
    }

    /// Create a pool sized by `worker_threads` and `max_queue_depth`.
    pub fn from_config(config: &StoreConfig) -> io::Result<Self> {
        Self::new(config.worker_threads, config.max_queue_depth)
    }

    /// Block until all queued and in-flight jobs have completed.
    ///
    /// Workers remain running after drain completes.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queue_depth.load(Ordering::Acquire) > 0
            || self.inner.active_jobs.load(Ordering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Shut down the pool: signal workers to exit and join all threads.
    ///
    /// Workers drain remaining jobs before exiting.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);

        // Notify under the queue lock so a worker between its shutdown check
        // and its wait cannot miss the wakeup.
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        let current = std::thread::current().id();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            // A job may hold the last reference to the pool.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    /// Return a snapshot of pool metrics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_jobs: self.inner.active_jobs.load(Ordering::Relaxed),
            jobs_completed: self.inner.jobs_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl BlockingExecutor for BlockingPool {
    fn submit(&self, job: Job) -> Result<(), SubmitError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }

        {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.max_queue_depth {
                return Err(SubmitError::QueueFull);
            }
            queue.push_back(job);
            self.inner.queue_depth.fetch_add(1, Ordering::Release);
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BlockingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPool")
            .field("stats", &self.stats())
            .field("max_queue_depth", &self.inner.max_queue_depth)
            .finish()
    }
}

/// RAII guard that decrements `active_jobs` and notifies drain waiters on drop.
///
/// Keeps the bookkeeping correct when a job panics.
struct ActiveJobGuard<'a> {
    inner: &'a PoolInner,
}

impl<'a> Drop for ActiveJobGuard<'a> {
    fn drop(&mut self) {
        let prev_active = self.inner.active_jobs.fetch_sub(1, Ordering::Release);
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);

        if prev_active == 1 && self.inner.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    inner.active_jobs.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveJobGuard { inner };

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
            error!(
                "blocking job panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
    }
}

/// Executor backed by `tokio::task::spawn_blocking`.
///
/// Uses the runtime it was created with, or the ambient runtime at submit
/// time when created with [`TokioBlocking::new`].
#[derive(Debug, Clone, Default)]
pub struct TokioBlocking {
    handle: Option<tokio::runtime::Handle>,
}

impl TokioBlocking {
    /// Use whichever runtime is current when a job is submitted.
    pub fn new() -> Self {
        TokioBlocking { handle: None }
    }

    /// Always use `handle`.
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        TokioBlocking {
            handle: Some(handle),
        }
    }
}

impl BlockingExecutor for TokioBlocking {
    fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => tokio::runtime::Handle::try_current().map_err(|_| SubmitError::NoRuntime)?,
        };
        // Dropping the JoinHandle detaches the job; its result travels over
        // the channel in `run_blocking`.
        drop(handle.spawn_blocking(job));
        Ok(())
    }
}
