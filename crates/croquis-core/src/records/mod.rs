//! Plaintext record shapes. Every field added after the first release carries a
//! serde default so files written by older builds keep loading.

pub mod deck;
pub mod history;
pub mod pair;
pub mod recent;
pub mod settings;

pub use deck::{normalize_tags, Deck, DeckFilter, DeckImage, ShuffleMode, MAX_TAG_LEN};
pub use history::{HistoryLog, ImageMetadata, PracticeSession, Streaks};
pub use pair::DrawingPair;
pub use recent::RecentDecks;
pub use settings::{FontSize, OverlayPosition, SettingError, Settings, Shortcuts};
