//! Core types and traits for Keystash
//!
//! This crate defines the foundational types used by every store:
//! - StoreError: Error taxonomy for the write and load paths
//! - StoreRecord: Versioned record envelope written to disk
//! - PayloadCodec: Serialization seam (JSON, MessagePack)
//! - StoragePaths: Resolution of store keys to files
//! - StoreConfig: Configuration loaded from `keystash.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod paths;
pub mod record;

pub use codec::{CodecError, JsonCodec, MsgpackCodec, PayloadCodec};
pub use config::{ConfigError, StoreConfig, CONFIG_FILE_NAME};
pub use error::{StoreError, StoreResult};
pub use paths::{PathResolver, StoragePaths, STORAGE_DIR};
pub use record::{RawPayload, RecordHeader, StoreRecord};
