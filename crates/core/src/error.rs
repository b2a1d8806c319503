//! Error types for keystash
//!
//! This module defines the error taxonomy shared by every layer of the store.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Propagation
//!
//! | Error | Raised by | Reaches the caller of |
//! |-------|-----------|-----------------------|
//! | `Serialization` | write path | immediate `save` only |
//! | `Write` | write path | immediate `save` only |
//! | `Parse` | load path | `load` |
//! | `MigrationNotImplemented` | load path | `load` |
//! | `MigrationFailed` | load path | `load` |
//!
//! Failures of a delayed write are logged at the write boundary and never
//! returned to the code that scheduled it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for keystash operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload could not be encoded for storage
    #[error("Serialization error for '{key}': {detail}")]
    Serialization {
        /// Store key being written
        key: String,
        /// Codec message
        detail: String,
    },

    /// Encoding succeeded but the bytes could not be written
    #[error("Write error for {path}: {source}")]
    Write {
        /// Destination file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// On-disk bytes could not be decoded
    #[error("Parse error in {path}: {detail}")]
    Parse {
        /// File that failed to decode
        path: PathBuf,
        /// Codec message
        detail: String,
    },

    /// Stored version differs and no migration strategy was supplied
    #[error("No migration for '{key}' from version {from} to {to}")]
    MigrationNotImplemented {
        /// Store key
        key: String,
        /// Version found on disk
        from: u32,
        /// Version the store expects
        to: u32,
    },

    /// The migration strategy rejected the stored data
    #[error("Migration of '{key}' from version {from} failed: {detail}")]
    MigrationFailed {
        /// Store key
        key: String,
        /// Version found on disk
        from: u32,
        /// Message from the strategy
        detail: String,
    },

    /// I/O error outside the write path (reads, legacy file removal)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The blocking job could not be run to completion
    #[error("Executor error: {0}")]
    Executor(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create a serialization error for a key.
    pub fn serialization(key: impl Into<String>, detail: impl Into<String>) -> Self {
        StoreError::Serialization {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Create a parse error for a file.
    pub fn parse(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        StoreError::Parse {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create an executor error.
    pub fn executor(detail: impl Into<String>) -> Self {
        StoreError::Executor(detail.into())
    }

    /// True for errors produced while writing a record.
    ///
    /// These are the errors swallowed (and logged) for delayed writes.
    pub fn is_write_path(&self) -> bool {
        matches!(
            self,
            StoreError::Serialization { .. } | StoreError::Write { .. } | StoreError::Executor(_)
        )
    }

    /// True for errors produced while interpreting a stored record.
    pub fn is_load_path(&self) -> bool {
        matches!(
            self,
            StoreError::Parse { .. }
                | StoreError::MigrationNotImplemented { .. }
                | StoreError::MigrationFailed { .. }
        )
    }
}
