//! Storage directory structure
//!
//! Stores live in a single directory under the application's config root:
//!
//! ```text
//! <config root>/
//! ├── keystash.toml        # Optional configuration
//! └── .storage/            # One file per store key
//!     ├── settings
//!     ├── auth
//!     └── ...
//! ```

use std::path::{Path, PathBuf};

/// Default name of the storage directory under the config root.
pub const STORAGE_DIR: &str = ".storage";

/// Resolves the on-disk location of a store key.
pub trait PathResolver: Send + Sync {
    /// Path of the file holding the record for `key`.
    fn path_for(&self, key: &str) -> PathBuf;
}

/// Storage directory paths
///
/// Provides access to all paths within a config root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Application config root
    root: PathBuf,
    /// Name of the storage directory under the root
    storage_dir: String,
}

impl StoragePaths {
    /// Create paths from a config root, using [`STORAGE_DIR`].
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        StoragePaths {
            root: root.as_ref().to_path_buf(),
            storage_dir: STORAGE_DIR.to_string(),
        }
    }

    /// Use a different storage directory name.
    pub fn with_storage_dir(mut self, storage_dir: impl Into<String>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    /// Get the config root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the storage directory
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(&self.storage_dir)
    }

    /// Check if a record file exists for `key`
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }
}

impl PathResolver for StoragePaths {
    fn path_for(&self, key: &str) -> PathBuf {
        self.storage_dir().join(key)
    }
}
