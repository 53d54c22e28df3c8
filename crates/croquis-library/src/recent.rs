use anyhow::{Context, Result};
use croquis_core::{
    records::RecentDecks,
    store::{load_or_default, save_record, RecordStore},
};
use uuid::Uuid;

use crate::{load_for_rewrite, paths::RECENT};

/// Most-recently-opened decks, persisted as a singleton record.
pub struct RecentDeckList<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> RecentDeckList<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn load_for_update(&self) -> Result<RecentDecks> {
        load_for_rewrite(&self.store, RECENT).context("loading recent decks")
    }

    fn save(&self, recent: &RecentDecks) -> Result<()> {
        save_record(&self.store, RECENT, recent).context("saving recent decks")
    }

    /// Read-only; an unreadable record lists as empty and stays where it is.
    pub fn list(&self) -> Vec<Uuid> {
        load_or_default::<_, RecentDecks>(&self.store, RECENT)
            .record()
            .decks()
            .to_vec()
    }

    pub fn touch(&self, id: Uuid) -> Result<()> {
        let mut recent = self.load_for_update()?;
        recent.touch(id);
        self.save(&recent)
    }

    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut recent = self.load_for_update()?;
        if !recent.remove(id) {
            return Ok(false);
        }
        self.save(&recent)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use croquis_core::store::{InMemoryRecordStore, StoreError};

    use super::*;
    use crate::testing::FaultyStore;

    #[test]
    fn touch_orders_newest_first_and_persists() {
        let store = InMemoryRecordStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let recent = RecentDeckList::new(&store);
        assert!(recent.list().is_empty());
        recent.touch(first).expect("touch");
        recent.touch(second).expect("touch");
        recent.touch(first).expect("touch");

        assert_eq!(RecentDeckList::new(&store).list(), vec![first, second]);
    }

    #[test]
    fn remove_drops_entry() {
        let store = InMemoryRecordStore::new();
        let id = Uuid::new_v4();
        let recent = RecentDeckList::new(&store);
        recent.touch(id).expect("touch");
        assert!(recent.remove(id).expect("remove"));
        assert!(!recent.remove(id).expect("remove again"));
        assert!(recent.list().is_empty());
    }

    #[test]
    fn unreadable_record_starts_over() {
        let store = InMemoryRecordStore::new();
        store.put(RECENT, b"[1, 2, 3]").expect("put");
        let id = Uuid::new_v4();

        let recent = RecentDeckList::new(&store);
        assert!(recent.list().is_empty());
        recent.touch(id).expect("touch");
        assert_eq!(recent.list(), vec![id]);
    }

    #[test]
    fn listing_leaves_unreadable_record_in_place() {
        let store = InMemoryRecordStore::new();
        store.put(RECENT, b"[1, 2, 3]").expect("put");

        assert!(RecentDeckList::new(&store).list().is_empty());
        assert_eq!(store.get(RECENT).expect("untouched"), b"[1, 2, 3]");
        assert!(matches!(
            store.get("recent.dat.corrupt"),
            Err(StoreError::NotFound { .. })
        ));

        RecentDeckList::new(&store)
            .touch(Uuid::new_v4())
            .expect("touch");
        assert_eq!(store.get("recent.dat.corrupt").expect("set aside"), b"[1, 2, 3]");
    }

    #[test]
    fn touch_does_not_replace_record_it_cannot_read() {
        let mut store = FaultyStore::default();
        let kept = Uuid::new_v4();
        RecentDeckList::new(&store).touch(kept).expect("touch");

        store.unreadable = Some(RECENT);
        let recent = RecentDeckList::new(&store);
        assert!(recent.touch(Uuid::new_v4()).is_err());
        assert!(recent.remove(kept).is_err());

        store.unreadable = None;
        assert_eq!(RecentDeckList::new(&store).list(), vec![kept]);
    }
}
