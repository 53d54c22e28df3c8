use anyhow::Result;
use croquis_core::{
    records::{SettingError, Settings},
    store::{Loaded, RecordStore},
};
use croquis_library::SettingsService;

use crate::cli::SettingsCommand;

/// Execute a settings subcommand against `store`.
pub fn handle<S: RecordStore>(cmd: SettingsCommand, store: &S) -> Result<()> {
    let service = SettingsService::new(store);

    match cmd {
        SettingsCommand::Show => {
            let loaded = service.load();
            match &loaded {
                Loaded::Fresh(_) => println!("# no saved settings yet; defaults written"),
                Loaded::Recovered { error, .. } if error.is_corruption() => {
                    eprintln!("! saved settings could not be read ({error}); defaults restored")
                }
                Loaded::Recovered { error, .. } => {
                    eprintln!("! saved settings could not be read ({error}); showing defaults")
                }
                Loaded::Stored(_) => {}
            }
            print!("{}", toml::to_string_pretty(loaded.record())?);
        }
        SettingsCommand::Set { key, value } => {
            if let Err(err) = service.update(&key, &value) {
                if let Some(SettingError::UnknownKey(_)) = err.downcast_ref::<SettingError>() {
                    eprintln!("known settings: {}", Settings::KEYS.join(", "));
                }
                return Err(err);
            }
            println!("{key} = {value}");
        }
    }

    Ok(())
}
