//! Record services for the practice app, layered over any `RecordStore`:
//! the deck library, user settings, the practice journal and recent decks.

pub mod decks;
pub mod journal;
pub mod recent;
pub mod settings;

pub use decks::{probe_image, DeckLibrary, DeckListing, LoadFailure};
pub use journal::{DrawingCapture, PairListing, PracticeJournal, SessionCapture};
pub use recent::RecentDeckList;
pub use settings::SettingsService;

use croquis_core::store::{load_or_default, Loaded, RecordStore, StoreError};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Record locations relative to the data directory.
pub mod paths {
    pub const SETTINGS: &str = "settings.dat";
    pub const HISTORY: &str = "history.dat";
    pub const RECENT: &str = "recent.dat";
    pub const DECK_DIR: &str = "decks";
    pub const DECK_EXT: &str = "crdk";
    pub const PAIR_DIR: &str = "pairs";
    pub const PAIR_EXT: &str = "croq";
}

/// Move an unreadable record aside so a replacement does not destroy it.
pub(crate) fn set_aside<S>(store: &S, path: &str) -> Result<(), StoreError>
where
    S: RecordStore + ?Sized,
{
    match store.quarantine(path) {
        Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
        Err(error) => Err(error),
    }
}

/// Load a singleton that is about to be rewritten. A corrupt file is set aside
/// first; any other read failure is returned so nothing is written over it.
pub(crate) fn load_for_rewrite<S, R>(store: &S, path: &str) -> Result<R, StoreError>
where
    S: RecordStore + ?Sized,
    R: DeserializeOwned + Default,
{
    match load_or_default(store, path) {
        Loaded::Fresh(record) | Loaded::Stored(record) => Ok(record),
        Loaded::Recovered { record, error } if error.is_corruption() => {
            set_aside(store, path)?;
            warn!(path, kind = error.kind(), "unreadable record replaced with defaults");
            Ok(record)
        }
        Loaded::Recovered { error, .. } => Err(error),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use croquis_core::store::{InMemoryRecordStore, RecordStore, StoreError};

    /// In-memory store whose reads or writes of one path fail with an I/O error.
    #[derive(Default)]
    pub struct FaultyStore {
        pub inner: InMemoryRecordStore,
        pub unreadable: Option<&'static str>,
        pub unwritable: Option<&'static str>,
    }

    fn fail_on(target: Option<&str>, path: &str) -> Result<(), StoreError> {
        if target == Some(path) {
            return Err(StoreError::io("input/output error"));
        }
        Ok(())
    }

    impl RecordStore for FaultyStore {
        fn put(&self, path: &str, plaintext: &[u8]) -> Result<(), StoreError> {
            fail_on(self.unwritable, path)?;
            self.inner.put(path, plaintext)
        }

        fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            fail_on(self.unreadable, path)?;
            self.inner.get(path)
        }

        fn delete(&self, path: &str) -> Result<(), StoreError> {
            self.inner.delete(path)
        }

        fn list(&self, dir: &str, extension: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list(dir, extension)
        }

        fn quarantine(&self, path: &str) -> Result<String, StoreError> {
            self.inner.quarantine(path)
        }
    }
}
