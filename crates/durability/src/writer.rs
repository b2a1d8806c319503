//! Crash-safe record writer
//!
//! Uses the write-fsync-rename pattern:
//! 1. Write to a temporary file next to the target (`.<key>.tmp`)
//! 2. fsync the temporary file
//! 3. Atomic rename over the target
//! 4. fsync the parent directory
//!
//! Either the complete new record is visible or the previous one is. Steps 2
//! and 4 are skipped when fsync is disabled.

use keystash_core::{PayloadCodec, StoreError, StoreRecord, StoreResult};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes whole files atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordWriter {
    fsync: bool,
}

impl Default for RecordWriter {
    fn default() -> Self {
        RecordWriter { fsync: true }
    }
}

impl RecordWriter {
    /// Create a writer.
    pub fn new(fsync: bool) -> Self {
        RecordWriter { fsync }
    }

    /// Whether writes are fsynced.
    pub fn fsyncs(&self) -> bool {
        self.fsync
    }

    /// Replace the contents of `path` with `bytes`.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            fs::create_dir_all(dir)?;
        }

        let temp_path = temp_path_for(path);
        if let Err(e) = self.write_temp(&temp_path, bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if self.fsync {
            sync_dir(dir)?;
        }
        Ok(())
    }

    fn write_temp(&self, temp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = File::create(temp_path)?;
        file.write_all(bytes)?;
        if self.fsync {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Encode `record` with `codec` and write it to `path`.
///
/// Returns the number of bytes written.
pub fn write_record<C, D>(
    codec: &C,
    writer: &RecordWriter,
    path: &Path,
    record: &StoreRecord<D>,
) -> StoreResult<usize>
where
    C: PayloadCodec + ?Sized,
    D: Serialize,
{
    let bytes = codec
        .encode(record)
        .map_err(|e| StoreError::serialization(&record.key, e.detail()))?;

    debug!(key = %record.key, path = %path.display(), bytes = bytes.len(), "Writing data");
    writer
        .write(path, &bytes)
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bytes.len())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_core::{JsonCodec, RawPayload};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".storage").join("settings");

        RecordWriter::default().write(&path, b"hello").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        let writer = RecordWriter::new(false);

        writer.write(&path, b"first").unwrap();
        writer.write(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("settings")]);
    }

    #[test]
    fn test_write_fails_when_directory_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join(".storage");
        fs::write(&blocker, b"not a directory").unwrap();

        let result = RecordWriter::default().write(&blocker.join("settings"), b"x");
        assert!(result.is_err());
    }

    #[test]
    fn test_write_record_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        let record = StoreRecord::new(1, "settings", json!({"theme": "dark"}));

        let written = write_record(&JsonCodec::default(), &RecordWriter::new(false), &path, &record)
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), written);
        let value: RawPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"version": 1, "key": "settings", "data": {"theme": "dark"}})
        );
    }

    #[test]
    fn test_write_record_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings");
        let mut data = BTreeMap::new();
        data.insert((1, 2), "tuple keys are not valid JSON keys");
        let record = StoreRecord::new(1, "settings", data);

        let err = write_record(&JsonCodec::default(), &RecordWriter::new(false), &path, &record)
            .unwrap_err();

        assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "settings"));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_record_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join(".storage");
        fs::write(&blocker, b"file").unwrap();
        let path = blocker.join("settings");
        let record = StoreRecord::new(1, "settings", json!({}));

        let err = write_record(&JsonCodec::default(), &RecordWriter::new(false), &path, &record)
            .unwrap_err();

        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/a/.storage/settings")),
            PathBuf::from("/a/.storage/.settings.tmp")
        );
    }
}
