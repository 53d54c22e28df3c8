use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::StoreError;

/// Byte-level contract for records at rest. Paths are `/`-separated and relative
/// to the store root (e.g. `decks/<id>.crdk`); implementations encrypt on `put`
/// and authenticate on `get`.
pub trait RecordStore {
    /// Persist a value at `path`, replacing any existing record atomically.
    fn put(&self, path: &str, plaintext: &[u8]) -> Result<(), StoreError>;

    /// Retrieve and decrypt the value at `path`.
    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove the record at `path` (idempotent).
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// File names directly under `dir` ending in `extension`, sorted ascending.
    fn list(&self, dir: &str, extension: &str) -> Result<Vec<String>, StoreError>;

    /// Move an unreadable record aside to `<path>.corrupt` so a replacement does not
    /// destroy it. Returns the new path.
    fn quarantine(&self, path: &str) -> Result<String, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn put(&self, path: &str, plaintext: &[u8]) -> Result<(), StoreError> {
        (**self).put(path, plaintext)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(path)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        (**self).delete(path)
    }

    fn list(&self, dir: &str, extension: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(dir, extension)
    }

    fn quarantine(&self, path: &str) -> Result<String, StoreError> {
        (**self).quarantine(path)
    }
}

/// Serialize `record` as JSON and write it through the store.
pub fn save_record<S, R>(store: &S, path: &str, record: &R) -> Result<(), StoreError>
where
    S: RecordStore + ?Sized,
    R: Serialize,
{
    let bytes = serde_json::to_vec(record)?;
    store.put(path, &bytes)
}

/// Read, decrypt and deserialize the record at `path`.
pub fn load_record<S, R>(store: &S, path: &str) -> Result<R, StoreError>
where
    S: RecordStore + ?Sized,
    R: DeserializeOwned,
{
    let bytes = store.get(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Outcome of loading a singleton record that falls back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<R> {
    /// No file yet (first run); the default record was substituted.
    Fresh(R),
    /// Loaded from disk.
    Stored(R),
    /// A file was present but could not be read back; the default was substituted.
    Recovered { record: R, error: StoreError },
}

impl<R> Loaded<R> {
    pub fn record(&self) -> &R {
        match self {
            Loaded::Fresh(record) | Loaded::Stored(record) => record,
            Loaded::Recovered { record, .. } => record,
        }
    }

    pub fn into_record(self) -> R {
        match self {
            Loaded::Fresh(record) | Loaded::Stored(record) => record,
            Loaded::Recovered { record, .. } => record,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Loaded::Stored(_))
    }

    pub fn recovery_error(&self) -> Option<&StoreError> {
        match self {
            Loaded::Recovered { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Load a record, substituting `R::default()` when it is missing or unreadable.
/// Missing files are logged at debug; anything else at warn with the error kind.
pub fn load_or_default<S, R>(store: &S, path: &str) -> Loaded<R>
where
    S: RecordStore + ?Sized,
    R: DeserializeOwned + Default,
{
    match load_record(store, path) {
        Ok(record) => Loaded::Stored(record),
        Err(StoreError::NotFound { .. }) => {
            debug!(path, "no record yet, using defaults");
            Loaded::Fresh(R::default())
        }
        Err(error) => {
            warn!(path, kind = error.kind(), %error, "record unreadable, using defaults");
            Loaded::Recovered {
                record: R::default(),
                error,
            }
        }
    }
}

/// In-memory store for tests. Values are masked so plaintext never sits in the map,
/// but nothing is authenticated.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::io(format!("lock poisoned: {err}")))
    }
}

const MASK_BYTE: u8 = 0x5A;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, path: &str, plaintext: &[u8]) -> Result<(), StoreError> {
        self.entries()?.insert(path.to_string(), mask(plaintext));
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.entries()?
            .get(path)
            .map(|masked| mask(masked))
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.entries()?.remove(path);
        Ok(())
    }

    fn list(&self, dir: &str, extension: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let suffix = format!(".{extension}");
        Ok(self
            .entries()?
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|name| !name.contains('/') && name.ends_with(&suffix))
            .map(str::to_string)
            .collect())
    }

    fn quarantine(&self, path: &str) -> Result<String, StoreError> {
        let mut entries = self.entries()?;
        let value = entries.remove(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })?;
        let moved = format!("{path}.corrupt");
        entries.insert(moved.clone(), value);
        Ok(moved)
    }
}
