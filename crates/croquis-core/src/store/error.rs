use thiserror::Error;

/// Errors produced while deriving keys, sealing records or moving them to and from disk.
///
/// `Authentication`, `Format` and `Schema` describe a file that exists but cannot be
/// turned back into a record; `NotFound` is the first-run case and must stay distinct.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Machine identity could not be read, so no stable key exists.
    #[error("cannot establish machine identity: {reason}")]
    KeyDerivation { reason: String },
    /// Ciphertext was sealed under a different key or has been modified.
    #[error("authentication failed: data was written on another machine or account, or was modified")]
    Authentication,
    /// Bytes do not have the layout of a sealed record.
    #[error("malformed envelope: {reason}")]
    Format { reason: String },
    /// Decryption succeeded but the plaintext is not the expected record.
    #[error("unexpected record shape: {reason}")]
    Schema { reason: String },
    /// No record has been written at this location yet.
    #[error("no record at {path}")]
    NotFound { path: String },
    /// Underlying filesystem failure.
    #[error("storage failure: {reason}")]
    Io { reason: String },
}

impl StoreError {
    /// Short stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::KeyDerivation { .. } => "key_derivation",
            StoreError::Authentication => "authentication",
            StoreError::Format { .. } => "format",
            StoreError::Schema { .. } => "schema",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Io { .. } => "io",
        }
    }

    /// True when a file was present but its contents could not be recovered.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::Authentication | StoreError::Format { .. } | StoreError::Schema { .. }
        )
    }

    pub fn format(reason: impl Into<String>) -> Self {
        StoreError::Format {
            reason: reason.into(),
        }
    }

    pub fn io<E: ToString>(err: E) -> Self {
        StoreError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Schema {
            reason: err.to_string(),
        }
    }
}
