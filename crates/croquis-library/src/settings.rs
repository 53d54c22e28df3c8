use anyhow::{Context, Result};
use croquis_core::{
    records::Settings,
    store::{load_or_default, save_record, Loaded, RecordStore},
};
use tracing::{info, instrument, warn};

use crate::{load_for_rewrite, paths::SETTINGS, set_aside};

/// Loads and persists the settings singleton.
pub struct SettingsService<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load settings, writing defaults back when there was nothing on disk or
    /// the stored file was corrupt and has been set aside. A file that could not
    /// be read at all is left alone.
    #[instrument(skip(self))]
    pub fn load(&self) -> Loaded<Settings> {
        let loaded = load_or_default(&self.store, SETTINGS);
        let write_defaults = match &loaded {
            Loaded::Stored(_) => false,
            Loaded::Fresh(_) => true,
            Loaded::Recovered { error, .. } if error.is_corruption() => {
                match set_aside(&self.store, SETTINGS) {
                    Ok(()) => true,
                    Err(error) => {
                        warn!(%error, "could not move unreadable settings aside");
                        false
                    }
                }
            }
            Loaded::Recovered { .. } => false,
        };
        if write_defaults {
            if let Err(error) = save_record(&self.store, SETTINGS, loaded.record()) {
                warn!(%error, "could not write default settings");
            }
        }
        loaded
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        save_record(&self.store, SETTINGS, settings).context("saving settings")
    }

    /// Parse and apply one field, then persist. Nothing is written when the
    /// value is rejected.
    #[instrument(skip(self))]
    pub fn update(&self, key: &str, value: &str) -> Result<Settings> {
        let mut settings: Settings =
            load_for_rewrite(&self.store, SETTINGS).context("loading settings")?;
        settings.apply(key, value)?;
        self.save(&settings)?;
        info!("setting updated");
        Ok(settings)
    }
}
