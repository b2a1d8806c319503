//! Durability layer for keystash
//!
//! This crate handles everything that touches disk or time:
//!
//! - Store: versioned records with debounced, coalesced writes
//! - Shutdown flush: pending writes land before the process exits
//! - Migration: upgrading records written under an older schema version
//! - Legacy import: one-time adoption of pre-versioned JSON files
//! - Crash-safe record writer (temp file, fsync, rename)
//! - Pluggable facilities: blocking executor, timer, shutdown signal
//! - Write observation and deterministic test timers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel; // Cancellation handles for timers and listeners
pub mod executor; // Blocking executors (dedicated pool, Tokio)
pub mod legacy; // Legacy file import
pub mod migrate; // Migrator trait and strategies
pub mod observer; // Write outcome hook
pub mod reader; // Record and legacy-file reads
pub mod runtime; // Facility bundle shared by stores
pub mod shutdown; // Shutdown notification
pub mod store; // Store and StoreBuilder
pub mod testing; // Manual timer for deterministic tests
pub mod timer; // Debounce timers
pub mod writer; // Crash-safe record writes

pub use cancel::{BoxFuture, Callback, CancelHandle};
pub use executor::{
    run_blocking, BlockingExecutor, BlockingPool, Job, PoolStats, SubmitError, TokioBlocking,
};
pub use legacy::{import_legacy, import_legacy_with};
pub use migrate::{MigrationChain, MigrationError, Migrator, NoMigration};
pub use observer::{NoopObserver, RecordingObserver, WriteEvent, WriteObserver, WriteTrigger};
pub use reader::{read_legacy, read_record, LoadedRecord};
pub use runtime::StoreRuntime;
pub use shutdown::{ShutdownNotifier, ShutdownSignal};
pub use store::{Payload, Store, StoreBuilder};
pub use timer::{Timer, TokioTimer};
pub use writer::{write_record, RecordWriter};
