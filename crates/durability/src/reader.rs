//! Record and legacy-file readers.
//!
//! Both run on the blocking pool. A missing file is not an error: it means
//! nothing has been stored yet.

use keystash_core::{
    CodecError, PayloadCodec, RawPayload, RecordHeader, StoreError, StoreRecord, StoreResult,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;

/// A record as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedRecord<T> {
    /// Written under the expected version; `data` decoded straight into `T`.
    Current(StoreRecord<T>),
    /// Written under another version; `data` left untyped for a migrator.
    Outdated(StoreRecord<RawPayload>),
}

impl<T> LoadedRecord<T> {
    /// Key stored in the record.
    pub fn key(&self) -> &str {
        match self {
            LoadedRecord::Current(record) => &record.key,
            LoadedRecord::Outdated(record) => &record.key,
        }
    }
}

/// Read the record at `path`.
///
/// The header is decoded first. A record at `current_version` is decoded
/// directly into `T` by the codec, so payloads the untyped form cannot
/// represent (such as integer map keys under MessagePack) still load. Any
/// other version is decoded into [`RawPayload`].
///
/// Returns `Ok(None)` when the file does not exist and
/// [`StoreError::Parse`] when it exists but cannot be decoded.
pub fn read_record<C, T>(
    codec: &C,
    path: &Path,
    current_version: u32,
) -> StoreResult<Option<LoadedRecord<T>>>
where
    C: PayloadCodec + ?Sized,
    T: DeserializeOwned,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(e)),
    };
    let parse_error = |e: CodecError| StoreError::parse(path, e.to_string());

    let header: RecordHeader = codec.decode(&bytes).map_err(parse_error)?;
    let record = if header.version == current_version {
        LoadedRecord::Current(codec.decode(&bytes).map_err(parse_error)?)
    } else {
        LoadedRecord::Outdated(codec.decode(&bytes).map_err(parse_error)?)
    };
    Ok(Some(record))
}

/// Read a pre-versioned legacy file: a bare JSON document.
pub fn read_legacy(path: &Path) -> StoreResult<Option<RawPayload>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::parse(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_core::{JsonCodec, MsgpackCodec};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let result: Option<LoadedRecord<Value>> =
            read_record(&JsonCodec::default(), &temp_dir.path().join("nope"), 1).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_current_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        fs::write(&path, br#"{"version": 1, "key": "settings", "data": {"a": 1}}"#).unwrap();

        let record: LoadedRecord<HashMap<String, u32>> =
            read_record(&JsonCodec::default(), &path, 1).unwrap().unwrap();
        let expected = HashMap::from([("a".to_string(), 1)]);
        assert_eq!(
            record,
            LoadedRecord::Current(StoreRecord::new(1, "settings", expected))
        );
        assert_eq!(record.key(), "settings");
    }

    #[test]
    fn test_read_outdated_record_is_untyped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        fs::write(&path, br#"{"version": 1, "key": "settings", "data": {"a": "x"}}"#).unwrap();

        // The old payload does not fit the current type and is not asked to.
        let record: LoadedRecord<HashMap<String, u32>> =
            read_record(&JsonCodec::default(), &path, 2).unwrap().unwrap();
        assert_eq!(
            record,
            LoadedRecord::Outdated(StoreRecord::new(1, "settings", json!({"a": "x"})))
        );
    }

    #[test]
    fn test_msgpack_integer_keys_load_at_current_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("devices");
        let data = HashMap::from([(7u32, "lamp".to_string())]);
        let bytes = MsgpackCodec
            .encode(&StoreRecord::new(1, "devices", data.clone()))
            .unwrap();
        fs::write(&path, bytes).unwrap();

        let record: LoadedRecord<HashMap<u32, String>> =
            read_record(&MsgpackCodec, &path, 1).unwrap().unwrap();
        assert_eq!(
            record,
            LoadedRecord::Current(StoreRecord::new(1, "devices", data))
        );
    }

    #[test]
    fn test_corrupt_record_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        fs::write(&path, b"{\"version\": 1, \"key\"").unwrap();

        let err = read_record::<_, Value>(&JsonCodec::default(), &path, 1).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_payload_type_mismatch_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        fs::write(&path, br#"{"version": 1, "key": "settings", "data": [1, 2]}"#).unwrap();

        let err = read_record::<_, HashMap<String, u32>>(&JsonCodec::default(), &path, 1)
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_wrong_codec_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        fs::write(&path, br#"{"version": 1, "key": "settings", "data": {}}"#).unwrap();

        let err = read_record::<_, Value>(&MsgpackCodec, &path, 1).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_read_legacy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("legacy.json");
        assert!(read_legacy(&path).unwrap().is_none());

        fs::write(&path, br#"{"devices": ["lamp"]}"#).unwrap();
        assert_eq!(read_legacy(&path).unwrap(), Some(json!({"devices": ["lamp"]})));

        fs::write(&path, b"devices: [lamp]").unwrap();
        assert!(matches!(read_legacy(&path), Err(StoreError::Parse { .. })));
    }
}
