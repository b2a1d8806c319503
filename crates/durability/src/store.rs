//! Debounced, versioned store
//!
//! A [`Store`] holds one payload under one key. Saves are buffered in memory
//! and written either immediately or after a debounce delay; rapid saves
//! collapse into a single write of the latest payload.
//!
//! # Write State Machine
//!
//! ```text
//!            save(delay)            timer fires / shutdown
//!   Idle ─────────────────► Pending ──────────────────────► Writing ──► Idle
//!    │                       │  ▲                              ▲
//!    │                       └──┘ save(delay): re-arm timer    │
//!    └───────────────────────┴─────────────────────────────────┘
//!                      save(): write now
//! ```
//!
//! - At most one debounce timer and one shutdown listener exist per store.
//! - The pending payload is consumed when a write starts, whether or not the
//!   write succeeds. A save issued while a write is in flight is buffered and
//!   waits for its own trigger.
//! - Writes are serialized by a per-store async lock and run on the blocking
//!   executor.
//!
//! # Error Contract
//!
//! `save` (no delay) returns the write error. Delayed writes log failures and
//! report them to the [`WriteObserver`]; the code that scheduled them never
//! sees the error. Failed writes are not retried.

use crate::cancel::{Callback, CancelHandle};
use crate::executor::run_blocking;
use crate::migrate::{MigrationError, Migrator, NoMigration};
use crate::observer::{NoopObserver, WriteObserver, WriteTrigger};
use crate::reader::{read_record, LoadedRecord};
use crate::runtime::StoreRuntime;
use crate::writer::{write_record, RecordWriter};
use keystash_core::{
    JsonCodec, PathResolver, PayloadCodec, RawPayload, StoreConfig, StoreError, StoreRecord,
    StoreResult,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Types a store can hold.
///
/// `Default` is what `load` returns when nothing has been stored yet.
pub trait Payload: Serialize + DeserializeOwned + Clone + Default + Send + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Default + Send + 'static {}

struct StoreState<T> {
    /// Latest saved payload not yet handed to a write
    pending: Option<T>,
    delay_timer: Option<CancelHandle>,
    /// Bumped whenever the armed timer is replaced or released; a timer
    /// callback carrying an older generation does nothing.
    timer_generation: u64,
    stop_listener: Option<CancelHandle>,
}

impl<T> StoreState<T> {
    fn release_handles(&mut self) -> ReleasedHandles {
        self.timer_generation += 1;
        ReleasedHandles {
            timer: self.delay_timer.take(),
            listener: self.stop_listener.take(),
        }
    }
}

/// Handles taken out of the state, cancelled after the state lock is dropped.
struct ReleasedHandles {
    timer: Option<CancelHandle>,
    listener: Option<CancelHandle>,
}

impl ReleasedHandles {
    fn cancel(self) {
        if let Some(mut timer) = self.timer {
            timer.cancel();
        }
        if let Some(mut listener) = self.listener {
            listener.cancel();
        }
    }
}

struct StoreInner<T, C> {
    version: u32,
    key: String,
    path: PathBuf,
    codec: Arc<C>,
    writer: RecordWriter,
    runtime: StoreRuntime,
    migrator: Arc<dyn Migrator<T>>,
    observer: Arc<dyn WriteObserver>,
    default_delay: Option<Duration>,
    state: Mutex<StoreState<T>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<T: Payload, C: PayloadCodec> StoreInner<T, C> {
    fn timer_callback(self: &Arc<Self>, generation: u64) -> Callback {
        let inner = Arc::clone(self);
        Box::new(move || Box::pin(async move { inner.on_timer(generation).await }))
    }

    fn shutdown_callback(self: &Arc<Self>) -> Callback {
        let inner = Arc::clone(self);
        Box::new(move || Box::pin(async move { inner.on_shutdown().await }))
    }

    async fn on_timer(&self, generation: u64) {
        let released = {
            let mut state = self.state.lock();
            if state.timer_generation != generation {
                debug!(key = %self.key, "Ignoring superseded timer");
                return;
            }
            state.release_handles()
        };
        released.cancel();

        // Failures are logged and observed inside write_pending.
        let _ = self.write_pending(WriteTrigger::Timer).await;
    }

    async fn on_shutdown(&self) {
        let released = {
            let mut state = self.state.lock();
            state.release_handles()
        };
        released.cancel();

        info!(key = %self.key, "Writing pending data before shutdown");
        let _ = self.write_pending(WriteTrigger::Shutdown).await;
    }

    async fn write_pending(&self, trigger: WriteTrigger) -> StoreResult<()> {
        // Take the payload only once this write holds the lock, so a write
        // queued later can never persist an older payload.
        let guard = self.write_lock.lock().await;
        let data = {
            let mut state = self.state.lock();
            state.pending.take()
        };
        let Some(data) = data else {
            debug!(key = %self.key, %trigger, "Nothing pending to write");
            return Ok(());
        };

        let record = StoreRecord::new(self.version, self.key.clone(), data);
        let codec = Arc::clone(&self.codec);
        let writer = self.writer;
        let path = self.path.clone();
        let result = run_blocking(&*self.runtime.executor, move || {
            write_record(&*codec, &writer, &path, &record)
        })
        .await
        .and_then(|written| written);
        drop(guard);

        match &result {
            Ok(bytes) => {
                debug!(key = %self.key, %trigger, bytes = *bytes, "Wrote data");
                self.observer.on_write_succeeded(&self.key, trigger, *bytes);
            }
            Err(e) if trigger.is_fire_and_forget() => {
                error!(key = %self.key, %trigger, error = %e, "Error writing data");
                self.observer.on_write_failed(&self.key, trigger, e);
            }
            Err(e) => {
                warn!(key = %self.key, %trigger, error = %e, "Error writing data");
                self.observer.on_write_failed(&self.key, trigger, e);
            }
        }
        result.map(|_| ())
    }

    async fn load(&self) -> StoreResult<T> {
        let pending = {
            let state = self.state.lock();
            state.pending.clone()
        };
        if let Some(data) = pending {
            return Ok(data);
        }

        let codec = Arc::clone(&self.codec);
        let path = self.path.clone();
        let version = self.version;
        let record = run_blocking(&*self.runtime.executor, move || {
            read_record::<C, T>(&*codec, &path, version)
        })
        .await??;

        let Some(record) = record else {
            debug!(key = %self.key, path = %self.path.display(), "No stored data");
            return Ok(T::default());
        };

        if record.key() != self.key {
            warn!(
                key = %self.key,
                stored_key = %record.key(),
                "Stored record was written under a different key"
            );
        }

        match record {
            LoadedRecord::Current(record) => Ok(record.data),
            LoadedRecord::Outdated(record) => self.migrate(record.version, record.data),
        }
    }

    fn migrate(&self, from: u32, data: RawPayload) -> StoreResult<T> {
        info!(key = %self.key, from, to = self.version, "Migrating stored data");
        self.migrator.migrate(from, data).map_err(|e| match e {
            MigrationError::NotImplemented => StoreError::MigrationNotImplemented {
                key: self.key.clone(),
                from,
                to: self.version,
            },
            MigrationError::Failed(detail) => StoreError::MigrationFailed {
                key: self.key.clone(),
                from,
                detail,
            },
        })
    }
}

/// Versioned, debounced persistence for one payload.
///
/// Cloning yields another handle to the same store. Dropping every handle
/// while a delayed write is pending does not lose it: the armed timer and
/// shutdown listener keep the store alive until the write happens.
///
/// # Example
///
/// ```ignore
/// use keystash_durability::{ShutdownNotifier, Store, StoreRuntime};
/// use keystash_core::StoragePaths;
///
/// let notifier = ShutdownNotifier::new();
/// let runtime = StoreRuntime::tokio(notifier.clone());
/// let paths = StoragePaths::from_root("/etc/app");
///
/// let store: Store<Settings> = Store::new(runtime, &paths, 1, "settings");
/// let mut settings = store.load().await?;
/// settings.theme = "dark".into();
/// store.save_delayed(settings, Duration::from_secs(1));
///
/// // On exit:
/// notifier.shutdown().await;
/// ```
pub struct Store<T, C = JsonCodec> {
    inner: Arc<StoreInner<T, C>>,
}

impl<T, C> Clone for Store<T, C> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Payload> Store<T, JsonCodec> {
    /// Create a JSON store for `key` at schema `version` with default options.
    pub fn new(
        runtime: StoreRuntime,
        paths: &dyn PathResolver,
        version: u32,
        key: impl Into<String>,
    ) -> Self {
        StoreBuilder::new(runtime, paths, version, key).build()
    }

    /// Start building a store for `key` at schema `version`.
    pub fn builder(
        runtime: StoreRuntime,
        paths: &dyn PathResolver,
        version: u32,
        key: impl Into<String>,
    ) -> StoreBuilder<T, JsonCodec> {
        StoreBuilder::new(runtime, paths, version, key)
    }
}

impl<T: Payload, C: PayloadCodec> Store<T, C> {
    /// Load the current payload.
    ///
    /// Returns the pending payload if a save has not been written yet.
    /// Otherwise reads the stored record: a missing record yields
    /// `T::default()`, a record at another version goes through the
    /// migrator.
    ///
    /// # Errors
    ///
    /// `Parse`, `MigrationNotImplemented`, `MigrationFailed`, or an I/O or
    /// executor error. A record that exists but cannot be interpreted is
    /// never replaced by a default.
    pub async fn load(&self) -> StoreResult<T> {
        self.inner.load().await
    }

    /// Save `data` and write it now.
    ///
    /// Cancels any pending delayed write; `data` supersedes it.
    ///
    /// # Errors
    ///
    /// `Serialization`, `Write`, or an executor error from this write.
    pub async fn save(&self, data: T) -> StoreResult<()> {
        let released = {
            let mut state = self.inner.state.lock();
            state.pending = Some(data);
            state.release_handles()
        };
        released.cancel();

        self.inner.write_pending(WriteTrigger::Immediate).await
    }

    /// Save `data` and write it once `delay` passes without another save.
    ///
    /// Returns without waiting for the write. If shutdown is signaled first,
    /// the write happens then. Must be called within a Tokio runtime when
    /// the runtime uses Tokio timers.
    pub fn save_delayed(&self, data: T, delay: Duration) {
        let inner = &self.inner;
        let replaced = {
            let mut state = inner.state.lock();
            state.pending = Some(data);
            state.timer_generation += 1;

            let timer = inner
                .runtime
                .timer
                .after(delay, inner.timer_callback(state.timer_generation));
            let replaced = state.delay_timer.replace(timer);

            if state.stop_listener.is_none() {
                let listener = inner
                    .runtime
                    .shutdown
                    .on_shutdown_once(inner.shutdown_callback());
                state.stop_listener = Some(listener);
            }
            replaced
        };

        if let Some(mut timer) = replaced {
            timer.cancel();
        }
        debug!(key = %inner.key, ?delay, "Scheduled delayed write");
    }

    /// Save with an optional delay: `None` behaves like [`save`](Self::save),
    /// `Some` like [`save_delayed`](Self::save_delayed).
    pub async fn save_with_delay(&self, data: T, delay: Option<Duration>) -> StoreResult<()> {
        match delay {
            None => self.save(data).await,
            Some(delay) => {
                self.save_delayed(data, delay);
                Ok(())
            }
        }
    }

    /// Save with the store's default delay, or immediately if it has none.
    pub async fn save_debounced(&self, data: T) -> StoreResult<()> {
        self.save_with_delay(data, self.inner.default_delay).await
    }

    /// Write the pending payload now, if there is one.
    ///
    /// Cancels the debounce timer and shutdown listener.
    pub async fn flush(&self) -> StoreResult<()> {
        let released = {
            let mut state = self.inner.state.lock();
            state.release_handles()
        };
        released.cancel();

        self.inner.write_pending(WriteTrigger::Flush).await
    }

    /// True if a saved payload has not been handed to a write yet.
    pub fn has_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Schema version this store writes.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Store key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// File holding the record.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub(crate) fn runtime(&self) -> &StoreRuntime {
        &self.inner.runtime
    }
}

impl<T, C: PayloadCodec> std::fmt::Debug for Store<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Store")
            .field("key", &self.inner.key)
            .field("version", &self.inner.version)
            .field("path", &self.inner.path)
            .field("codec", &self.inner.codec.codec_id())
            .field("pending", &state.pending.is_some())
            .field("timer_armed", &state.delay_timer.is_some())
            .field("shutdown_listener", &state.stop_listener.is_some())
            .finish()
    }
}

/// Builder for [`Store`].
pub struct StoreBuilder<T, C = JsonCodec> {
    runtime: StoreRuntime,
    path: PathBuf,
    version: u32,
    key: String,
    codec: C,
    migrator: Arc<dyn Migrator<T>>,
    observer: Arc<dyn WriteObserver>,
    writer: RecordWriter,
    default_delay: Option<Duration>,
}

impl<T: Payload> StoreBuilder<T, JsonCodec> {
    /// Start a JSON store for `key`, resolving its file through `paths`.
    pub fn new(
        runtime: StoreRuntime,
        paths: &dyn PathResolver,
        version: u32,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        StoreBuilder {
            runtime,
            path: paths.path_for(&key),
            version,
            key,
            codec: JsonCodec::default(),
            migrator: Arc::new(NoMigration),
            observer: Arc::new(NoopObserver),
            writer: RecordWriter::default(),
            default_delay: None,
        }
    }

    /// Start a JSON store laid out and tuned by `config` under `root`.
    pub fn from_config(
        runtime: StoreRuntime,
        config: &StoreConfig,
        root: impl AsRef<Path>,
        version: u32,
        key: impl Into<String>,
    ) -> Self {
        let codec = if config.pretty {
            JsonCodec::pretty()
        } else {
            JsonCodec::compact()
        };
        StoreBuilder::new(runtime, &config.paths(root), version, key)
            .codec(codec)
            .fsync(config.fsync)
            .maybe_default_delay(config.default_delay())
    }
}

impl<T: Payload, C: PayloadCodec> StoreBuilder<T, C> {
    /// Use a different codec.
    pub fn codec<C2: PayloadCodec>(self, codec: C2) -> StoreBuilder<T, C2> {
        StoreBuilder {
            runtime: self.runtime,
            path: self.path,
            version: self.version,
            key: self.key,
            codec,
            migrator: self.migrator,
            observer: self.observer,
            writer: self.writer,
            default_delay: self.default_delay,
        }
    }

    /// Use `migrator` when the stored version differs.
    pub fn migrator(mut self, migrator: impl Migrator<T> + 'static) -> Self {
        self.migrator = Arc::new(migrator);
        self
    }

    /// Use a closure when the stored version differs.
    pub fn migrate_with<F>(self, migrate: F) -> Self
    where
        F: Fn(u32, RawPayload) -> Result<T, MigrationError> + Send + Sync + 'static,
    {
        self.migrator(migrate)
    }

    /// Report write outcomes to `observer`.
    pub fn observer(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// fsync on every write (default `true`).
    pub fn fsync(mut self, fsync: bool) -> Self {
        self.writer = RecordWriter::new(fsync);
        self
    }

    /// Delay used by [`Store::save_debounced`].
    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    fn maybe_default_delay(mut self, delay: Option<Duration>) -> Self {
        self.default_delay = delay;
        self
    }

    /// Build the store.
    pub fn build(self) -> Store<T, C> {
        Store {
            inner: Arc::new(StoreInner {
                version: self.version,
                key: self.key,
                path: self.path,
                codec: Arc::new(self.codec),
                writer: self.writer,
                runtime: self.runtime,
                migrator: self.migrator,
                observer: self.observer,
                default_delay: self.default_delay,
                state: Mutex::new(StoreState {
                    pending: None,
                    delay_timer: None,
                    timer_generation: 0,
                    stop_listener: None,
                }),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}
