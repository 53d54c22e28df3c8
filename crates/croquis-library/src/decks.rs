use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use croquis_core::{
    records::{normalize_tags, Deck, DeckFilter, DeckImage, ImageMetadata},
    store::{load_record, save_record, RecordStore, StoreError},
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::paths::{DECK_DIR, DECK_EXT};

pub const MAX_DIFFICULTY: u8 = 5;

/// A record file that exists but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub file: String,
    pub error: StoreError,
}

/// Every deck that loaded, plus the ones that did not. A bad deck file never
/// hides the others.
#[derive(Debug, Default)]
pub struct DeckListing {
    pub decks: Vec<Deck>,
    pub failures: Vec<LoadFailure>,
}

/// Deck repository backed by a `RecordStore` (one encrypted file per deck).
pub struct DeckLibrary<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> DeckLibrary<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn path(id: Uuid) -> String {
        format!("{DECK_DIR}/{id}.{DECK_EXT}")
    }

    #[instrument(skip(self))]
    pub fn list(&self) -> Result<DeckListing> {
        let mut listing = DeckListing::default();
        for file in self.store.list(DECK_DIR, DECK_EXT)? {
            let path = format!("{DECK_DIR}/{file}");
            match load_record::<_, Deck>(&self.store, &path) {
                Ok(deck) => listing.decks.push(deck),
                Err(error) => {
                    warn!(file = %file, kind = error.kind(), %error, "deck failed to load");
                    listing.failures.push(LoadFailure { file, error });
                }
            }
        }
        listing
            .decks
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(listing)
    }

    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            bail!("deck name cannot be empty");
        }
        let deck = Deck::new(name);
        self.save(&deck)?;
        info!(id = %deck.id, "deck created");
        Ok(deck)
    }

    pub fn get(&self, id: Uuid) -> Result<Deck> {
        load_record(&self.store, &Self::path(id)).with_context(|| format!("loading deck {id}"))
    }

    pub fn save(&self, deck: &Deck) -> Result<()> {
        save_record(&self.store, &Self::path(deck.id), deck)
            .with_context(|| format!("saving deck {}", deck.id))
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(&Self::path(id))?;
        Ok(())
    }

    /// Returns false when an image with the same filename was already present.
    #[instrument(skip(self, image), fields(filename = %image.filename))]
    pub fn add_image(&self, id: Uuid, mut image: DeckImage) -> Result<bool> {
        check_difficulty(image.difficulty)?;
        image.tags = normalize_tags(std::mem::take(&mut image.tags));
        self.update(id, |deck| Ok(deck.add_image(image)))
    }

    /// Probe an image file and add it to the deck, optionally embedding its bytes.
    /// Returns `None` when the deck already holds an image with that filename.
    #[instrument(skip(self))]
    pub fn import_image(
        &self,
        id: Uuid,
        source: &Path,
        difficulty: u8,
        embed: bool,
    ) -> Result<Option<DeckImage>> {
        check_difficulty(difficulty)?;
        let probed = probe_image(source)?;
        let mut image = DeckImage::new(probed.filename, probed.path);
        image.width = probed.width;
        image.height = probed.height;
        image.size = probed.size;
        image.difficulty = difficulty;
        if embed {
            image.embed(&fs::read(source)?);
        }

        let added = self.update(id, |deck| Ok(deck.add_image(image.clone())))?;
        Ok(added.then_some(image))
    }

    pub fn remove_image(&self, id: Uuid, filename: &str) -> Result<DeckImage> {
        self.update(id, |deck| {
            deck.remove_image(filename)
                .ok_or_else(|| anyhow!("deck has no image named {filename}"))
        })
    }

    /// Replace an image's tags with their normalized form.
    pub fn set_tags(&self, id: Uuid, filename: &str, tags: BTreeSet<String>) -> Result<()> {
        let tags = normalize_tags(tags);
        self.update(id, |deck| {
            if deck.set_tags(filename, tags) {
                Ok(())
            } else {
                Err(anyhow!("deck has no image named {filename}"))
            }
        })
    }

    pub fn set_filter(&self, id: Uuid, mut filter: DeckFilter) -> Result<Deck> {
        if let Some(max) = filter.max_difficulty {
            check_difficulty(max)?;
        }
        filter.enabled_tags = normalize_tags(filter.enabled_tags);
        self.update(id, |deck| {
            deck.filter = filter;
            deck.touch();
            Ok(deck.clone())
        })
    }

    fn update<T>(&self, id: Uuid, edit: impl FnOnce(&mut Deck) -> Result<T>) -> Result<T> {
        let mut deck = self.get(id)?;
        let out = edit(&mut deck)?;
        self.save(&deck)?;
        Ok(out)
    }
}

/// Read a reference image's name, pixel dimensions and file size.
pub fn probe_image(source: &Path) -> Result<ImageMetadata> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", source.display()))?;
    let (width, height) = image::image_dimensions(source)
        .with_context(|| format!("{} is not a readable image", source.display()))?;
    Ok(ImageMetadata {
        filename: filename.to_string(),
        path: source.to_string_lossy().into_owned(),
        width,
        height,
        size: fs::metadata(source)?.len(),
    })
}

fn check_difficulty(difficulty: u8) -> Result<()> {
    if !(1..=MAX_DIFFICULTY).contains(&difficulty) {
        bail!("difficulty must be between 1 and {MAX_DIFFICULTY}, got {difficulty}");
    }
    Ok(())
}
