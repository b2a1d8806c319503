//! Store configuration via `keystash.toml`
//!
//! Every field has a default, so a missing or partial file is valid. The same
//! settings can be assembled in code with the `with_*` methods.

use crate::error::StoreError;
use crate::paths::{StoragePaths, STORAGE_DIR};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the config root.
pub const CONFIG_FILE_NAME: &str = "keystash.toml";

/// Store configuration loaded from `keystash.toml`.
///
/// # Example
///
/// ```toml
/// storage_dir = ".storage"
/// fsync = true
/// pretty = true
/// worker_threads = 2
/// max_queue_depth = 1024
/// default_delay_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory under the config root that holds store files.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    /// fsync the temp file and parent directory on every write.
    #[serde(default = "default_true")]
    pub fsync: bool,
    /// Indented JSON output.
    #[serde(default = "default_true")]
    pub pretty: bool,
    /// Worker threads in the blocking pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Jobs the blocking pool queues before rejecting new ones.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    /// Delay used by `save_debounced`, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_delay_ms: Option<u64>,
}

fn default_storage_dir() -> String {
    STORAGE_DIR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_worker_threads() -> usize {
    2
}

fn default_max_queue_depth() -> usize {
    1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            storage_dir: default_storage_dir(),
            fsync: true,
            pretty: true,
            worker_threads: default_worker_threads(),
            max_queue_depth: default_max_queue_depth(),
            default_delay_ms: None,
        }
    }
}

impl StoreConfig {
    /// Create config for testing
    ///
    /// Skips fsync and uses a single worker.
    pub fn for_testing() -> Self {
        StoreConfig {
            fsync: false,
            worker_threads: 1,
            ..Default::default()
        }
    }

    /// Set the storage directory name
    pub fn with_storage_dir(mut self, storage_dir: impl Into<String>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    /// Enable or disable fsync on write
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Enable or disable indented JSON
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set blocking pool size
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set blocking pool queue capacity
    pub fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the delay used by `save_debounced`
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Delay used by `save_debounced`, if configured.
    pub fn default_delay(&self) -> Option<Duration> {
        self.default_delay_ms.map(Duration::from_millis)
    }

    /// Storage paths for a config root under this configuration.
    pub fn paths(&self, root: impl AsRef<Path>) -> StoragePaths {
        StoragePaths::from_root(root).with_storage_dir(self.storage_dir.clone())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_dir.is_empty() {
            return Err(ConfigError::InvalidStorageDir(
                "storage_dir must not be empty".to_string(),
            ));
        }
        if Path::new(&self.storage_dir).is_absolute() {
            return Err(ConfigError::InvalidStorageDir(format!(
                "storage_dir '{}' must be relative to the config root",
                self.storage_dir
            )));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.max_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        Ok(())
    }

    /// Read, parse, and validate config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Read(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `keystash.toml` from a config root, falling back to defaults when
    /// the file does not exist.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Read(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("{0}")]
    Read(String),

    /// Config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(String),

    /// Bad storage directory name
    #[error("Invalid storage dir: {0}")]
    InvalidStorageDir(String),

    /// Blocking pool with no workers
    #[error("worker_threads must be at least 1")]
    ZeroWorkers,

    /// Blocking pool that can queue nothing
    #[error("max_queue_depth must be at least 1")]
    ZeroQueueDepth,
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::Config(e.to_string())
    }
}
