//! Concrete storage for croquis records: machine-bound keys and encryption at rest.
//! Keys are derived from the host's hardware id and OS user, never stored; records
//! are sealed with AES-256-GCM and written atomically.

pub mod envelope;
pub mod file_store;
pub mod identity;
pub mod key;

pub use envelope::MachineCipher;
pub use file_store::{EncryptedFileStore, StagedWrite};
pub use identity::{host_identity_source, FixedIdentity, IdentitySource, MachineIdentity};
pub use key::{derive_key, MachineKey};
