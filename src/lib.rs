//! keystash - Durable, versioned key-value persistence
//!
//! keystash keeps one serializable payload per key in a file under a storage
//! directory. Every record carries a schema version, saves can be debounced
//! so bursts of changes cost a single write, and pending writes are flushed
//! when the host shuts down.
//!
//! # Quick Start
//!
//! ```ignore
//! use keystash::{ShutdownNotifier, StoragePaths, Store, StoreRuntime};
//! use std::time::Duration;
//!
//! let notifier = ShutdownNotifier::new();
//! let runtime = StoreRuntime::tokio(notifier.clone());
//! let paths = StoragePaths::from_root("/var/lib/app");
//!
//! let store: Store<Settings> = Store::new(runtime, &paths, 1, "settings");
//! let mut settings = store.load().await?;
//! settings.theme = "dark".into();
//! store.save_delayed(settings, Duration::from_secs(1));
//!
//! // Last step of the stop sequence
//! notifier.shutdown().await;
//! ```
//!
//! # Architecture
//!
//! - `keystash-core`: records, codecs, errors, paths, configuration
//! - `keystash-durability`: stores, writers, migrations, legacy import, and
//!   the executor, timer, and shutdown facilities they run on

pub use keystash_core::*;
pub use keystash_durability::*;
