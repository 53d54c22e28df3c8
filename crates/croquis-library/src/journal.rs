use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use croquis_core::{
    records::{DrawingPair, HistoryLog, ImageMetadata, PracticeSession},
    store::{load_or_default, load_record, save_record, Loaded, RecordStore},
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    decks::LoadFailure,
    load_for_rewrite,
    paths::{HISTORY, PAIR_DIR, PAIR_EXT},
};

/// Raw images captured when a drawing is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingCapture {
    pub original: Vec<u8>,
    pub screenshot: Vec<u8>,
}

/// Everything the practice screen knows about one completed drawing.
#[derive(Debug, Clone, Default)]
pub struct SessionCapture {
    pub duration_secs: u32,
    pub deck_id: Option<Uuid>,
    pub image: Option<ImageMetadata>,
    pub drawing: Option<DrawingCapture>,
}

/// Drawing pairs found on disk, newest first, plus files that failed to load.
#[derive(Debug, Default)]
pub struct PairListing {
    pub pairs: Vec<(String, DrawingPair)>,
    pub failures: Vec<LoadFailure>,
}

/// Practice history and the drawing-pair archive.
pub struct PracticeJournal<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> PracticeJournal<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn history(&self) -> Loaded<HistoryLog> {
        load_or_default(&self.store, HISTORY)
    }

    /// Append one session to the history. A captured drawing is archived first
    /// so the session can reference it, and removed again if the history write
    /// fails.
    #[instrument(skip_all, fields(duration_secs = capture.duration_secs))]
    pub fn record_session(
        &self,
        capture: SessionCapture,
        now: DateTime<Local>,
    ) -> Result<PracticeSession> {
        let mut history: HistoryLog =
            load_for_rewrite(&self.store, HISTORY).context("loading history")?;

        let pair = match capture.drawing {
            Some(drawing) => Some(self.archive_pair(
                &drawing,
                now,
                capture.duration_secs,
                capture.image.clone().unwrap_or_default(),
            )?),
            None => None,
        };

        let session = PracticeSession {
            recorded_at: now.with_timezone(&Utc),
            date: now.date_naive(),
            duration_secs: capture.duration_secs,
            deck_id: capture.deck_id,
            image: capture.image,
            pair,
        };

        history.append(session.clone());
        if let Err(error) = save_record(&self.store, HISTORY, &history) {
            if let Some(name) = &session.pair {
                if let Err(cleanup) = self.store.delete(&Self::pair_path(name)) {
                    warn!(pair = %name, error = %cleanup, "could not remove unreferenced pair");
                }
            }
            return Err(anyhow::Error::new(error).context("saving history"));
        }
        info!(total = history.len(), "session recorded");
        Ok(session)
    }

    fn archive_pair(
        &self,
        drawing: &DrawingCapture,
        now: DateTime<Local>,
        duration_secs: u32,
        image: ImageMetadata,
    ) -> Result<String> {
        let pair = DrawingPair::new(
            &drawing.original,
            &drawing.screenshot,
            now.naive_local(),
            duration_secs,
            image,
        );
        let name = self.unused_pair_name(&pair.file_name())?;
        save_record(&self.store, &Self::pair_path(&name), &pair)
            .with_context(|| format!("saving drawing pair {name}"))?;
        Ok(name)
    }

    // Two drawings of the same image within one second would collide.
    fn unused_pair_name(&self, wanted: &str) -> Result<String> {
        let existing = self.store.list(PAIR_DIR, PAIR_EXT)?;
        if !existing.iter().any(|n| n == wanted) {
            return Ok(wanted.to_string());
        }
        let stem = wanted.trim_end_matches(&format!(".{PAIR_EXT}")[..]);
        let name = (2..)
            .map(|n| format!("{stem}-{n}.{PAIR_EXT}"))
            .find(|candidate| !existing.contains(candidate))
            .unwrap_or_else(|| wanted.to_string());
        Ok(name)
    }

    fn pair_path(name: &str) -> String {
        format!("{PAIR_DIR}/{name}")
    }

    #[instrument(skip(self))]
    pub fn pairs(&self) -> Result<PairListing> {
        let mut listing = PairListing::default();
        for file in self.store.list(PAIR_DIR, PAIR_EXT)?.into_iter().rev() {
            match load_record::<_, DrawingPair>(&self.store, &Self::pair_path(&file)) {
                Ok(pair) => listing.pairs.push((file, pair)),
                Err(error) => {
                    warn!(file = %file, kind = error.kind(), %error, "drawing pair failed to load");
                    listing.failures.push(LoadFailure { file, error });
                }
            }
        }
        Ok(listing)
    }

    pub fn load_pair(&self, name: &str) -> Result<DrawingPair> {
        check_pair_name(name)?;
        load_record(&self.store, &Self::pair_path(name))
            .with_context(|| format!("loading drawing pair {name}"))
    }

    #[instrument(skip(self, memo))]
    pub fn set_memo(&self, name: &str, memo: &str) -> Result<DrawingPair> {
        let mut pair = self.load_pair(name)?;
        pair.memo = memo.to_string();
        save_record(&self.store, &Self::pair_path(name), &pair)
            .with_context(|| format!("saving drawing pair {name}"))?;
        Ok(pair)
    }
}

fn check_pair_name(name: &str) -> Result<()> {
    let valid = name
        .strip_suffix(&format!(".{PAIR_EXT}")[..])
        .is_some_and(|stem| !stem.is_empty())
        && !name.contains(['/', '\\']);
    if !valid {
        bail!("{name:?} is not a drawing pair file name");
    }
    Ok(())
}
