//! One-time import of pre-versioned data files.
//!
//! Before records carried a version envelope, data lived in a bare JSON file.
//! Importing reads that file, saves its contents through a [`Store`] (which
//! writes immediately), then deletes the legacy file.

use crate::executor::run_blocking;
use crate::reader::read_legacy;
use crate::store::{Payload, Store};
use keystash_core::{PayloadCodec, RawPayload, StoreError, StoreResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Import the legacy file at `path` into `store` as-is.
///
/// Returns `Ok(None)` if there is no such file. Otherwise the parsed contents
/// are saved through `store`, the legacy file is removed, and the imported
/// payload is returned.
///
/// # Errors
///
/// - [`StoreError::Parse`] if the file is not valid JSON
/// - [`StoreError::MigrationFailed`] if its contents do not fit `T`
/// - any error from the store's immediate save
/// - an I/O or executor error from deleting the legacy file; the new record
///   is already on disk when this is returned
///
/// The legacy file is left in place on every error.
pub async fn import_legacy<T, C>(
    path: impl AsRef<Path>,
    store: &Store<T, C>,
) -> StoreResult<Option<T>>
where
    T: Payload,
    C: PayloadCodec,
{
    import_legacy_with(path, store, |raw| {
        serde_json::from_value(raw).map_err(|e| e.to_string())
    })
    .await
}

/// Import the legacy file at `path` into `store`, reshaping its contents with
/// `transform` first.
///
/// `transform` receives the parsed JSON document; an `Err` from it becomes
/// [`StoreError::MigrationFailed`] with `from: 0`.
pub async fn import_legacy_with<T, C, F>(
    path: impl AsRef<Path>,
    store: &Store<T, C>,
    transform: F,
) -> StoreResult<Option<T>>
where
    T: Payload,
    C: PayloadCodec,
    F: FnOnce(RawPayload) -> Result<T, String> + Send,
{
    let path: PathBuf = path.as_ref().to_path_buf();
    let executor = &*store.runtime().executor;

    let read_path = path.clone();
    let Some(raw) = run_blocking(executor, move || read_legacy(&read_path)).await?? else {
        debug!(path = %path.display(), "No legacy file to import");
        return Ok(None);
    };

    let data = transform(raw).map_err(|detail| StoreError::MigrationFailed {
        key: store.key().to_string(),
        from: 0,
        detail,
    })?;

    store.save(data.clone()).await?;

    let remove_path = path.clone();
    run_blocking(executor, move || match fs::remove_file(&remove_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e)),
    })
    .await??;

    info!(key = %store.key(), path = %path.display(), "Imported legacy data");
    Ok(Some(data))
}
