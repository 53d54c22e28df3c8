use std::{fmt, fs, path::PathBuf};

use croquis_core::store::StoreError;
use tracing::debug;

/// Host-identifying inputs to key derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineIdentity {
    pub hardware_id: String,
    pub username: String,
}

impl fmt::Debug for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Identifiers are key material; show lengths only.
        f.debug_struct("MachineIdentity")
            .field("hardware_id_len", &self.hardware_id.len())
            .field("username_len", &self.username.len())
            .finish()
    }
}

impl MachineIdentity {
    /// Trim and case-fold both parts; empty parts are rejected.
    pub fn new(
        hardware_id: impl AsRef<str>,
        username: impl AsRef<str>,
    ) -> Result<Self, StoreError> {
        let hardware_id = hardware_id.as_ref().trim().to_ascii_lowercase();
        let username = username.as_ref().trim().to_string();
        if hardware_id.is_empty() {
            return Err(key_err("hardware id is empty"));
        }
        if username.is_empty() {
            return Err(key_err("username is empty"));
        }
        Ok(Self {
            hardware_id,
            username,
        })
    }
}

/// Where the hardware/installation id comes from. One implementation per host OS.
pub trait IdentitySource {
    /// Short label for logs and the `identity` command.
    fn name(&self) -> &'static str;

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError>;
}

/// Fixed identity for tests, provisioning, and simulating another machine.
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    hardware_id: String,
    username: String,
}

impl FixedIdentity {
    pub fn new(hardware_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hardware_id: hardware_id.into(),
            username: username.into(),
        }
    }
}

impl IdentitySource for FixedIdentity {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError> {
        MachineIdentity::new(&self.hardware_id, &self.username)
    }
}

/// systemd/dbus machine-id file (Linux and most BSDs).
#[derive(Debug, Clone)]
pub struct MachineIdFile {
    candidates: Vec<PathBuf>,
}

impl Default for MachineIdFile {
    fn default() -> Self {
        Self {
            candidates: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
        }
    }
}

impl MachineIdFile {
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    fn read_id(&self) -> Result<String, StoreError> {
        for path in &self.candidates {
            match fs::read_to_string(path) {
                Ok(contents) if !contents.trim().is_empty() => {
                    debug!(path = %path.display(), "read machine id");
                    return Ok(contents);
                }
                Ok(_) => debug!(path = %path.display(), "machine id file is empty"),
                Err(err) => debug!(path = %path.display(), %err, "machine id file unreadable"),
            }
        }
        Err(key_err("no readable machine-id file"))
    }
}

impl IdentitySource for MachineIdFile {
    fn name(&self) -> &'static str {
        "machine-id"
    }

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError> {
        MachineIdentity::new(self.read_id()?, current_username()?)
    }
}

/// `IOPlatformUUID` reported by `ioreg` (macOS).
#[derive(Debug, Clone, Default)]
pub struct PlatformUuid;

impl IdentitySource for PlatformUuid {
    fn name(&self) -> &'static str {
        "platform-uuid"
    }

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError> {
        let output = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .map_err(|err| key_err(format!("ioreg failed to start: {err}")))?;
        if !output.status.success() {
            return Err(key_err(format!("ioreg exited with {}", output.status)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let uuid = parse_platform_uuid(&stdout)
            .ok_or_else(|| key_err("IOPlatformUUID missing from ioreg output"))?;
        MachineIdentity::new(uuid, current_username()?)
    }
}

/// `HKLM\SOFTWARE\Microsoft\Cryptography\MachineGuid` (Windows).
#[cfg(windows)]
#[derive(Debug, Clone, Default)]
pub struct RegistryMachineGuid;

#[cfg(windows)]
impl IdentitySource for RegistryMachineGuid {
    fn name(&self) -> &'static str {
        "registry-machine-guid"
    }

    fn machine_identity(&self) -> Result<MachineIdentity, StoreError> {
        use winreg::{
            enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY},
            RegKey,
        };

        let guid: String = RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey_with_flags(
                r"SOFTWARE\Microsoft\Cryptography",
                KEY_READ | KEY_WOW64_64KEY,
            )
            .and_then(|key| key.get_value("MachineGuid"))
            .map_err(|err| key_err(format!("MachineGuid unreadable: {err}")))?;
        MachineIdentity::new(guid, current_username()?)
    }
}

/// The canonical identity source for the host OS.
pub fn host_identity_source() -> Box<dyn IdentitySource> {
    #[cfg(windows)]
    {
        Box::new(RegistryMachineGuid)
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(PlatformUuid)
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        Box::new(MachineIdFile::default())
    }
}

fn current_username() -> Result<String, StoreError> {
    username_from(|var| std::env::var(var).ok())
}

fn username_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String, StoreError> {
    ["USER", "USERNAME", "LOGNAME"]
        .into_iter()
        .filter_map(lookup)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .ok_or_else(|| key_err("cannot determine OS username"))
}

fn parse_platform_uuid(ioreg: &str) -> Option<&str> {
    ioreg
        .lines()
        .find(|line| line.contains("\"IOPlatformUUID\""))
        .and_then(|line| line.split('=').nth(1))
        .map(|value| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

fn key_err(reason: impl Into<String>) -> StoreError {
    StoreError::KeyDerivation {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_normalized() {
        let id = MachineIdentity::new("  ABCDEF01\n", " alice ").expect("identity");
        assert_eq!(id.hardware_id, "abcdef01");
        assert_eq!(id.username, "alice");
    }

    #[test]
    fn empty_parts_fail_key_derivation() {
        let err = MachineIdentity::new("   ", "alice").expect_err("empty id");
        assert!(matches!(err, StoreError::KeyDerivation { .. }));
        let err = FixedIdentity::new("abc", "")
            .machine_identity()
            .expect_err("empty user");
        assert!(matches!(err, StoreError::KeyDerivation { .. }));
    }

    #[test]
    fn debug_does_not_leak_identifiers() {
        let id = MachineIdentity::new("secret-machine", "alice").expect("identity");
        let printed = format!("{id:?}");
        assert!(!printed.contains("secret-machine"));
        assert!(!printed.contains("alice"));
    }

    #[test]
    fn machine_id_file_uses_first_non_empty_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty");
        let real = dir.path().join("machine-id");
        fs::write(&empty, "\n").expect("write");
        fs::write(&real, "0123456789abcdef\n").expect("write");

        let source =
            MachineIdFile::with_candidates(vec![dir.path().join("missing"), empty, real]);
        assert_eq!(source.read_id().expect("id").trim(), "0123456789abcdef");
    }

    #[test]
    fn machine_id_file_fails_without_candidates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = MachineIdFile::with_candidates(vec![dir.path().join("missing")]);
        let err = source.read_id().expect_err("no id");
        assert!(matches!(err, StoreError::KeyDerivation { .. }));
    }

    #[test]
    fn username_prefers_first_non_empty_variable() {
        let name = username_from(|var| match var {
            "USER" => Some("  ".to_string()),
            "USERNAME" => Some("bob".to_string()),
            _ => None,
        })
        .expect("username");
        assert_eq!(name, "bob");
        assert!(username_from(|_| None).is_err());
    }

    #[test]
    fn parses_ioreg_output() {
        let out = r#"+-o J316sAP  <class IOPlatformExpertDevice, id 0x100000209>
    {
      "IOPlatformSerialNumber" = "XYZ"
      "IOPlatformUUID" = "5B2A1D8E-7C3F-4E9A-B1D2-0F6E8A9C7B3D"
    }"#;
        assert_eq!(
            parse_platform_uuid(out),
            Some("5B2A1D8E-7C3F-4E9A-B1D2-0F6E8A9C7B3D")
        );
        assert_eq!(parse_platform_uuid("nothing here"), None);
    }
}
