//! On-disk record envelope
//!
//! Every store file holds exactly one record:
//!
//! ```text
//! {
//!   "version": 1,
//!   "key": "settings",
//!   "data": { ... }
//! }
//! ```
//!
//! The record is written and read as a whole. The byte layout is owned by the
//! codec; this module only fixes the three logical fields.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

/// Untyped payload as decoded from storage.
///
/// Records are first decoded into this form so that data written under an
/// older schema can be handed to a migrator before it is converted into the
/// application's payload type.
pub type RawPayload = serde_json::Value;

/// Versioned record written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord<D> {
    /// Schema version of `data`
    pub version: u32,
    /// Key of the store that wrote the record
    pub key: String,
    /// Application payload
    pub data: D,
}

impl<D> StoreRecord<D> {
    /// Create a record for the given store identity.
    pub fn new(version: u32, key: impl Into<String>, data: D) -> Self {
        StoreRecord {
            version,
            key: key.into(),
            data,
        }
    }
}

/// Identity fields of a record, decoded without materializing `data`.
///
/// Lets a reader pick the payload type from the stored version before
/// decoding the payload itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordHeader {
    /// Schema version of the stored data
    pub version: u32,
    /// Key of the store that wrote the record
    pub key: String,
    #[serde(rename = "data")]
    _data: IgnoredAny,
}
