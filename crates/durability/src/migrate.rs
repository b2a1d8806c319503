//! Schema migration for stored records
//!
//! When a store loads a record whose version differs from its own, the raw
//! stored data is handed to a [`Migrator`] together with the stored version.
//! A store without a migrator fails the load with
//! `StoreError::MigrationNotImplemented`.
//!
//! Three strategies are provided:
//! - [`NoMigration`]: the default; every mismatch is an error
//! - any `Fn(u32, RawPayload) -> Result<T, MigrationError>` closure
//! - [`MigrationChain`]: one step per version, applied in sequence

use keystash_core::RawPayload;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Migration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// No strategy knows how to upgrade from this version.
    #[error("migration not implemented")]
    NotImplemented,

    /// The strategy ran and rejected the data.
    #[error("{0}")]
    Failed(String),
}

impl MigrationError {
    /// Create a failure with a message.
    pub fn failed(detail: impl Into<String>) -> Self {
        MigrationError::Failed(detail.into())
    }
}

/// Upgrades stored data to the current payload type.
pub trait Migrator<T>: Send + Sync {
    /// Produce a current-version payload from data stored under
    /// `old_version`.
    fn migrate(&self, old_version: u32, old_data: RawPayload) -> Result<T, MigrationError>;
}

/// Strategy for stores that never change schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMigration;

impl<T> Migrator<T> for NoMigration {
    fn migrate(&self, _old_version: u32, _old_data: RawPayload) -> Result<T, MigrationError> {
        Err(MigrationError::NotImplemented)
    }
}

impl<T, F> Migrator<T> for F
where
    F: Fn(u32, RawPayload) -> Result<T, MigrationError> + Send + Sync,
{
    fn migrate(&self, old_version: u32, old_data: RawPayload) -> Result<T, MigrationError> {
        self(old_version, old_data)
    }
}

type Step = Box<dyn Fn(RawPayload) -> Result<RawPayload, MigrationError> + Send + Sync>;

/// Version-by-version migration.
///
/// Each step upgrades raw data from version `n` to `n + 1`. Loading a record
/// at version 1 into a store at version 3 runs the steps registered for 1
/// and 2, then converts the result into `T`.
///
/// # Example
///
/// ```ignore
/// let chain = MigrationChain::<Settings>::new(3)
///     .step(1, |mut data| { data["theme_v2"] = data["theme"].take(); Ok(data) })
///     .step(2, |data| Ok(json!({ "ui": data })));
/// ```
pub struct MigrationChain<T> {
    target: u32,
    steps: BTreeMap<u32, Step>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> MigrationChain<T> {
    /// Create an empty chain that upgrades to `target`.
    pub fn new(target: u32) -> Self {
        MigrationChain {
            target,
            steps: BTreeMap::new(),
            _payload: PhantomData,
        }
    }

    /// Register the step that upgrades `from` to `from + 1`.
    pub fn step(
        mut self,
        from: u32,
        step: impl Fn(RawPayload) -> Result<RawPayload, MigrationError> + Send + Sync + 'static,
    ) -> Self {
        self.steps.insert(from, Box::new(step));
        self
    }

    /// Version this chain upgrades to.
    pub fn target(&self) -> u32 {
        self.target
    }
}

impl<T: DeserializeOwned> Migrator<T> for MigrationChain<T> {
    fn migrate(&self, old_version: u32, old_data: RawPayload) -> Result<T, MigrationError> {
        if old_version > self.target {
            return Err(MigrationError::NotImplemented);
        }

        let mut version = old_version;
        let mut data = old_data;
        while version < self.target {
            let step = self
                .steps
                .get(&version)
                .ok_or(MigrationError::NotImplemented)?;
            data = step(data)?;
            version += 1;
        }

        serde_json::from_value(data).map_err(|e| MigrationError::failed(e.to_string()))
    }
}

impl<T> std::fmt::Debug for MigrationChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationChain")
            .field("target", &self.target)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}
