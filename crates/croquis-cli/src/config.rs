use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/croquis/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the data directory (encrypted records).
    pub data_dir: Option<PathBuf>,
    /// Compress records before sealing them. Defaults to on.
    pub compress: Option<bool>,
    /// Pin the key-derivation inputs instead of reading them from the host.
    pub identity: Option<IdentityConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    pub hardware_id: Option<String>,
    pub username: Option<String>,
}

impl Config {
    pub fn compress(&self) -> bool {
        self.compress.unwrap_or(true)
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from `path`. A missing or blank file means defaults; a file that
/// cannot be read or parsed is an error naming the path.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(err).wrap_err_with(|| format!("reading {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    toml::from_str(&contents).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// `<config_dir>/croquis/config.toml`.
pub fn default_path() -> Result<PathBuf> {
    config_dir()
        .map(|base| base.join("croquis").join("config.toml"))
        .ok_or_else(|| eyre!("no per-user config directory on this platform"))
}

/// Write `config` to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
