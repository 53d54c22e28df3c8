use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use croquis_core::store::{RecordCipher, RecordStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

/// Encrypted file-backed store implementing the shared `RecordStore` contract.
/// Every record is one sealed file under `root`; writes land via temp file + rename.
pub struct EncryptedFileStore<C: RecordCipher> {
    root: PathBuf,
    cipher: C,
}

impl<C: RecordCipher> EncryptedFileStore<C> {
    pub fn new(root: impl Into<PathBuf>, cipher: C) -> Self {
        Self {
            root: root.into(),
            cipher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Absolute location of a record path, rejecting anything that would escape `root`.
    pub fn path_for(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut out = self.root.clone();
        for segment in path.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(&['\\', ':'][..])
            {
                return Err(StoreError::io(format!("invalid record path: {path:?}")));
            }
            out.push(segment);
        }
        Ok(out)
    }

    /// Seal `plaintext` into a temp file beside its target without replacing it.
    /// Nothing changes at `path` until [`StagedWrite::commit`]; dropping the stage
    /// discards it.
    pub fn stage(&self, path: &str, plaintext: &[u8]) -> Result<StagedWrite, StoreError> {
        let target = self.path_for(path)?;
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::io("invalid storage path"))?;
        fs::create_dir_all(parent).map_err(StoreError::io)?;

        let sealed = self.cipher.encrypt_record(plaintext)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::io)?;
        tmp.write_all(&sealed).map_err(StoreError::io)?;
        tmp.flush().map_err(StoreError::io)?;
        tmp.as_file().sync_all().map_err(StoreError::io)?;
        Ok(StagedWrite { tmp, target })
    }
}

/// A sealed record written to a temp file, waiting to replace its target.
pub struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Atomically rename over the target.
    pub fn commit(self) -> Result<(), StoreError> {
        self.tmp
            .persist(&self.target)
            .map_err(|e| StoreError::io(e.error))?;
        Ok(())
    }
}

impl<C: RecordCipher> RecordStore for EncryptedFileStore<C> {
    #[instrument(skip_all, fields(path = %path))]
    fn put(&self, path: &str, plaintext: &[u8]) -> Result<(), StoreError> {
        self.stage(path, plaintext)?.commit()?;
        debug!("record written");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path))]
    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.path_for(path)?;
        let sealed = fs::read(&file).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::io(err)
            }
        })?;
        self.cipher.decrypt_record(&sealed)
    }

    #[instrument(skip_all, fields(path = %path))]
    fn delete(&self, path: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(path)?) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(err)),
        }
    }

    fn list(&self, dir: &str, extension: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.path_for(dir)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io)?;
            if !entry.file_type().map_err(StoreError::io)?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    #[instrument(skip_all, fields(path = %path))]
    fn quarantine(&self, path: &str) -> Result<String, StoreError> {
        let moved = format!("{path}.corrupt");
        fs::rename(self.path_for(path)?, self.path_for(&moved)?).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StoreError::io(err)
            }
        })?;
        warn!(moved = %moved, "unreadable record moved aside");
        Ok(moved)
    }
}
