//! Read-through cell access backed by the keyed store and the file mirror.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ConfigCell, NON_REGRESSING, site_defaults};
use crate::persistence::FileMirror;
use crate::store::{KeyedStore, StoreError};

/// Errors that can occur when reading or writing a cell.
#[derive(Debug, Error)]
pub enum CellError {
    /// The keyed store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A typed value could not be encoded as JSON.
    #[error("cannot encode cell value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for cell operations.
pub type Result<T> = std::result::Result<T, CellError>;

/// What a call to [`CellStore::set`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The store already held this value; nothing was written.
    Unchanged,
    /// An empty value for a non-regressing cell was dropped.
    Rejected,
    /// The store was updated.
    Written,
}

/// Access to the configuration cells.
///
/// Reads always go to the keyed store so every worker sees the same value.
/// Writes go to the store first and are then mirrored to the local file.
#[derive(Debug, Clone)]
pub struct CellStore<S> {
    store: S,
    mirror: Arc<FileMirror>,
}

impl<S: KeyedStore> CellStore<S> {
    pub fn new(store: S, mirror: Arc<FileMirror>) -> Self {
        CellStore { store, mirror }
    }

    /// The underlying keyed store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mirror(&self) -> &FileMirror {
        &self.mirror
    }

    /// Returns the decoded value of `name`, or `None` if it was never set.
    ///
    /// A stored value that is not valid JSON reads as absent.
    pub async fn get(&self, name: &str) -> Result<Option<Value>> {
        let Some(raw) = self.store.get(name).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(cell = name, error = %e, "malformed cell value in store treated as absent");
                Ok(None)
            }
        }
    }

    /// Writes `value` to `name` unless it is already current.
    pub async fn set(&self, name: &str, value: Value) -> Result<SetOutcome> {
        if NON_REGRESSING.contains(&name) && is_empty_equivalent(&value) {
            debug!(cell = name, "refusing to clear non-regressing cell");
            return Ok(SetOutcome::Rejected);
        }
        if self.get(name).await?.as_ref() == Some(&value) {
            return Ok(SetOutcome::Unchanged);
        }

        self.store.set(name, &serde_json::to_string(&value)?).await?;
        info!(cell = name, value = %value, "cell updated");
        self.mirror_put(name, &value);
        Ok(SetOutcome::Written)
    }

    /// Establishes the starting value of `name`.
    ///
    /// The store wins if it already has a value. Otherwise the mirror's copy
    /// is adopted, and failing that `default`. The adopted value is only
    /// published if no other worker initialized the cell in the meantime.
    pub async fn init(&self, name: &str, default: Value) -> Result<Value> {
        if let Some(current) = self.get(name).await? {
            return Ok(current);
        }

        let from_mirror = match self.mirror.get(name) {
            Ok(value) => value,
            Err(e) => {
                warn!(cell = name, error = %e, "cannot read mirror; using default");
                None
            }
        };
        let (candidate, origin) = match from_mirror {
            Some(value) => (value, "mirror"),
            None => (default, "default"),
        };

        let encoded = serde_json::to_string(&candidate)?;
        if self.store.set_if_absent(name, &encoded, None).await? {
            info!(cell = name, origin, value = %candidate, "cell initialized");
            return Ok(candidate);
        }
        // Lost the race to another worker; its value is authoritative.
        Ok(self.get(name).await?.unwrap_or(candidate))
    }

    /// Initializes every site cell with its default.
    pub async fn bootstrap(&self) -> Result<()> {
        for (name, default) in site_defaults() {
            self.init(name, default).await?;
        }
        Ok(())
    }

    /// Reads a typed cell. A value of the wrong shape reads as absent.
    pub async fn read<T: DeserializeOwned>(&self, cell: &ConfigCell<T>) -> Result<Option<T>> {
        let Some(value) = self.get(cell.name()).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                warn!(cell = cell.name(), error = %e, "cell value has unexpected shape; treated as absent");
                Ok(None)
            }
        }
    }

    /// Writes a typed cell.
    pub async fn write<T: Serialize>(&self, cell: &ConfigCell<T>, value: &T) -> Result<SetOutcome> {
        self.set(cell.name(), serde_json::to_value(value)?).await
    }

    fn mirror_put(&self, name: &str, value: &Value) {
        // The store is authoritative; a failed mirror write only weakens cold-start recovery.
        if let Err(e) = self.mirror.put(name, value) {
            warn!(
                cell = name,
                path = %self.mirror.path().display(),
                error = %e,
                "failed to mirror cell"
            );
        }
    }
}

fn is_empty_equivalent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
