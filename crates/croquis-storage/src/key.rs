use std::fmt;

use croquis_core::store::StoreError;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::identity::{IdentitySource, MachineIdentity};

/// Fixed application salt mixed into every derived key.
pub const APP_SALT: &[u8] = b"croquis-practice/record-store/v1";

const KEY_INFO: &[u8] = b"croquis record key";

pub const KEY_LEN: usize = 32;

/// 256-bit record key bound to one machine and OS user. Wiped on drop; `Debug`
/// prints only the fingerprint.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MachineKey {
    bytes: [u8; KEY_LEN],
}

impl MachineKey {
    /// Read the host identity and derive the key from it.
    pub fn derive(source: &dyn IdentitySource) -> Result<Self, StoreError> {
        let identity = source.machine_identity()?;
        derive_key(&identity)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short, non-reversible label safe to log (never log key bytes).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::new()
            .chain_update(b"croquis key fingerprint")
            .chain_update(self.bytes)
            .finalize();
        digest[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for MachineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineKey({})", self.fingerprint())
    }
}

/// SHA-256 over the length-prefixed salt, hardware id and username, then HKDF-SHA256
/// expansion of that digest into the AES-256 key.
pub fn derive_key(identity: &MachineIdentity) -> Result<MachineKey, StoreError> {
    let mut hasher = Sha256::new();
    for part in [
        APP_SALT,
        identity.hardware_id.as_bytes(),
        identity.username.as_bytes(),
    ] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    let mut digest = Zeroizing::new([0u8; 32]);
    digest.copy_from_slice(&hasher.finalize());

    let hkdf = Hkdf::<Sha256>::new(Some(APP_SALT), &digest[..]);
    let mut key = MachineKey {
        bytes: [0u8; KEY_LEN],
    };
    hkdf.expand(KEY_INFO, &mut key.bytes)
        .map_err(|err| StoreError::KeyDerivation {
            reason: format!("key expansion failed: {err}"),
        })?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FixedIdentity;

    fn key(hardware_id: &str, username: &str) -> MachineKey {
        MachineKey::derive(&FixedIdentity::new(hardware_id, username)).expect("derive")
    }

    #[test]
    fn derivation_is_deterministic() {
        let first = key("4c4c4544-0042", "alice");
        let second = key("4c4c4544-0042", "alice");
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn different_machines_or_users_get_different_keys() {
        let base = key("4c4c4544-0042", "alice");
        assert_ne!(base.as_bytes(), key("4c4c4544-0043", "alice").as_bytes());
        assert_ne!(base.as_bytes(), key("4c4c4544-0042", "bob").as_bytes());
    }

    #[test]
    fn length_prefix_separates_shifted_boundaries() {
        assert_ne!(key("ab", "c").as_bytes(), key("a", "bc").as_bytes());
    }

    #[test]
    fn hardware_id_case_does_not_matter() {
        assert_eq!(
            key("ABCDEF", "alice").as_bytes(),
            key("abcdef", "alice").as_bytes()
        );
    }

    #[test]
    fn missing_identity_is_a_key_derivation_error() {
        let err = MachineKey::derive(&FixedIdentity::new("", "alice")).expect_err("no id");
        assert!(matches!(err, StoreError::KeyDerivation { .. }));
    }

    #[test]
    fn debug_shows_fingerprint_only() {
        let k = key("4c4c4544-0042", "alice");
        let printed = format!("{k:?}");
        assert_eq!(printed, format!("MachineKey({})", k.fingerprint()));
        assert_eq!(k.fingerprint().len(), 12);
    }
}
