use std::path::PathBuf;

use color_eyre::{eyre::WrapErr, Result};
use croquis_core::store::StoreError;
use croquis_storage::{
    host_identity_source, EncryptedFileStore, IdentitySource, MachineCipher, MachineIdentity,
    MachineKey,
};
use dirs::data_dir;
use tracing::{debug, info};

use crate::config::{Config, IdentityConfig};

pub type Store = EncryptedFileStore<MachineCipher>;

/// Resolve the default data directory for croquis records.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("croquis"))
}

pub fn data_dir_from_config(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Host identity with any config overrides layered on top.
pub struct ConfiguredIdentity {
    host: Box<dyn IdentitySource>,
    overrides: IdentityConfig,
}

impl ConfiguredIdentity {
    pub fn new(host: Box<dyn IdentitySource>, overrides: IdentityConfig) -> Self {
        Self { host, overrides }
    }
}

impl IdentitySource for ConfiguredIdentity {
    fn name(&self) -> &'static str {
        match (&self.overrides.hardware_id, &self.overrides.username) {
            (None, None) => self.host.name(),
            (Some(_), Some(_)) => "config",
            _ => "config+host",
        }
    }

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError> {
        if let (Some(hardware_id), Some(username)) =
            (&self.overrides.hardware_id, &self.overrides.username)
        {
            return MachineIdentity::new(hardware_id, username);
        }
        let host = self.host.machine_identity()?;
        MachineIdentity::new(
            self.overrides
                .hardware_id
                .as_deref()
                .unwrap_or(&host.hardware_id),
            self.overrides.username.as_deref().unwrap_or(&host.username),
        )
    }
}

pub fn identity_from_config(config: &Config) -> ConfiguredIdentity {
    ConfiguredIdentity::new(
        host_identity_source(),
        config.identity.clone().unwrap_or_default(),
    )
}

/// Derive this machine's record key. Without it nothing on disk can be opened.
pub fn machine_key(identity: &dyn IdentitySource) -> Result<MachineKey> {
    let key = MachineKey::derive(identity).wrap_err_with(|| {
        format!(
            "could not derive the machine key from the {} identity source; \
             set [identity] in the config file to provide it explicitly",
            identity.name()
        )
    })?;
    info!(source = identity.name(), fingerprint = %key.fingerprint(), "machine key derived");
    Ok(key)
}

/// Build the encrypted store from config, sealing records with `key`.
pub fn store_from_config(config: &Config, key: &MachineKey) -> Result<Store> {
    let root = data_dir_from_config(config)?;
    debug!(?root, compress = config.compress(), "initializing encrypted store");
    Ok(EncryptedFileStore::new(
        root,
        MachineCipher::new(key).with_compression(config.compress()),
    ))
}

/// Helper for tests to construct a store rooted at a temp dir with a fixed identity.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> Store {
    let key = MachineKey::derive(&croquis_storage::FixedIdentity::new("test-machine", "tester"))
        .expect("test key");
    EncryptedFileStore::new(root, MachineCipher::new(&key))
}
