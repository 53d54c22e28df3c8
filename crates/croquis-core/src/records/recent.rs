use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Most-recently-opened decks, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RecentDecks {
    #[serde(default)]
    decks: Vec<Uuid>,
}

impl RecentDecks {
    pub const CAPACITY: usize = 5;

    /// Move `id` to the front, dropping the oldest entry past capacity.
    pub fn touch(&mut self, id: Uuid) {
        self.decks.retain(|d| *d != id);
        self.decks.insert(0, id);
        self.decks.truncate(Self::CAPACITY);
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.decks.len();
        self.decks.retain(|d| *d != id);
        self.decks.len() != before
    }

    pub fn decks(&self) -> &[Uuid] {
        &self.decks
    }
}
