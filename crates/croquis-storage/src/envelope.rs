//! Self-contained sealed-record layout:
//!
//! ```text
//! magic "CRQS" (4) | version (1) | flags (1) | nonce (12) | AES-256-GCM ciphertext + tag (16)
//! ```
//!
//! The six header bytes are authenticated as associated data, so a modification
//! anywhere in the envelope fails authentication.

use std::{
    borrow::Cow,
    io::{Read, Write},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use croquis_core::store::{RecordCipher, StoreError};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::key::MachineKey;

pub const MAGIC: &[u8; 4] = b"CRQS";
pub const VERSION: u8 = 1;

const FLAG_DEFLATE: u8 = 0b0000_0001;
const KNOWN_FLAGS: u8 = FLAG_DEFLATE;

const HEADER_LEN: usize = 6;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

// Files from releases that sealed everything under one static key (Fernet tokens).
const LEGACY_TOKEN_PREFIX: &[u8] = b"gAAAAA";

/// AES-256-GCM record cipher keyed by the machine key.
pub struct MachineCipher {
    aead: Aes256Gcm,
    compress: bool,
}

impl MachineCipher {
    pub fn new(key: &MachineKey) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
            compress: true,
        }
    }

    /// Toggle zlib compression of new envelopes. Reading honours each envelope's flag.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

fn header(flags: u8) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(MAGIC);
    header[4] = VERSION;
    header[5] = flags;
    header
}

impl RecordCipher for MachineCipher {
    fn encrypt_record(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        let (flags, body) = if self.compress {
            (FLAG_DEFLATE, Cow::Owned(deflate(plaintext)?))
        } else {
            (0, Cow::Borrowed(plaintext))
        };
        let header = header(flags);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(
                &nonce,
                Payload {
                    msg: body.as_ref(),
                    aad: &header,
                },
            )
            .map_err(|e| StoreError::io(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + sealed.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt_record(&self, envelope: &[u8]) -> Result<Vec<u8>, StoreError> {
        if envelope.starts_with(LEGACY_TOKEN_PREFIX) {
            return Err(StoreError::format(
                "legacy token sealed with a static key; it cannot be bound to this machine",
            ));
        }
        if envelope.len() < MIN_ENVELOPE_LEN {
            return Err(StoreError::format(format!(
                "{} bytes is shorter than the {MIN_ENVELOPE_LEN}-byte minimum envelope",
                envelope.len()
            )));
        }

        let (header, rest) = envelope.split_at(HEADER_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let body = self
            .aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: header,
                },
            )
            .map_err(|_| StoreError::Authentication)?;

        // Authenticated from here on: only a writer holding this key can reach these.
        if &header[..4] != MAGIC {
            return Err(StoreError::format("unknown magic"));
        }
        if header[4] != VERSION {
            return Err(StoreError::format(format!(
                "unsupported envelope version {}",
                header[4]
            )));
        }
        let flags = header[5];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(StoreError::format(format!("unknown flags {flags:#010b}")));
        }
        if flags & FLAG_DEFLATE != 0 {
            inflate(&body)
        } else {
            Ok(body)
        }
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(StoreError::io)?;
    encoder.finish().map_err(StoreError::io)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| StoreError::format(format!("payload does not inflate: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;
    use crate::identity::FixedIdentity;

    fn cipher_for(hardware_id: &str, username: &str) -> MachineCipher {
        let key = MachineKey::derive(&FixedIdentity::new(hardware_id, username)).expect("key");
        MachineCipher::new(&key)
    }

    fn cipher() -> MachineCipher {
        cipher_for("4c4c4544-0042-3510-8057-b4c04f4d3732", "alice")
    }

    fn sample_record() -> Vec<u8> {
        br#"{"id":"8f0c","name":"Gesture 30s","images":[{"filename":"a.png"},{"filename":"b.png"}]}"#
            .to_vec()
    }

    #[test]
    fn round_trips_realistic_sizes() {
        let cipher = cipher();
        let mut random = vec![0u8; 64 * 1024];
        rand::thread_rng().fill_bytes(&mut random);
        let repetitive = "{\"filename\":\"pose.png\",\"tags\":[]},".repeat(500).into_bytes();

        for plaintext in [Vec::new(), sample_record(), random, repetitive] {
            let sealed = cipher.encrypt_record(&plaintext).expect("encrypt");
            assert_eq!(cipher.decrypt_record(&sealed).expect("decrypt"), plaintext);
        }
    }

    #[test]
    fn plaintext_is_not_visible_in_envelope() {
        let sealed = cipher()
            .with_compression(false)
            .encrypt_record(b"Gesture 30s")
            .expect("encrypt");
        assert!(!sealed.windows(7).any(|w| w == b"Gesture"));
        assert!(sealed.starts_with(MAGIC));
    }

    #[test]
    fn same_plaintext_seals_differently_each_time() {
        let cipher = cipher();
        let first = cipher.encrypt_record(&sample_record()).expect("encrypt");
        let second = cipher.encrypt_record(&sample_record()).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn any_single_bit_flip_fails_authentication() {
        let cipher = cipher();
        let sealed = cipher.encrypt_record(&sample_record()).expect("encrypt");
        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    cipher.decrypt_record(&tampered),
                    Err(StoreError::Authentication),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn truncated_envelope_fails_authentication() {
        let cipher = cipher();
        let sealed = cipher.encrypt_record(&sample_record()).expect("encrypt");
        let truncated = &sealed[..sealed.len() - 1];
        assert_eq!(
            cipher.decrypt_record(truncated),
            Err(StoreError::Authentication)
        );
    }

    #[test]
    fn other_machine_or_user_cannot_decrypt() {
        let sealed = cipher().encrypt_record(&sample_record()).expect("encrypt");
        for other in [
            cipher_for("4c4c4544-0042-3510-8057-b4c04f4d3733", "alice"),
            cipher_for("4c4c4544-0042-3510-8057-b4c04f4d3732", "bob"),
        ] {
            assert_eq!(other.decrypt_record(&sealed), Err(StoreError::Authentication));
        }
    }

    #[test]
    fn short_input_is_a_format_error() {
        let err = cipher().decrypt_record(b"CRQS\x01").expect_err("short");
        assert!(matches!(err, StoreError::Format { .. }));
        let err = cipher().decrypt_record(b"").expect_err("empty");
        assert!(matches!(err, StoreError::Format { .. }));
    }

    #[test]
    fn legacy_token_is_a_format_error() {
        let legacy = b"gAAAAABlZx3kq2Xv1yQ8n0m6t4Jc9Ww7Zk0Pp5Rr2Ss3Tt4Uu5Vv6Ww7Xx8Yy9Zz0Aa1Bb2Cc3Dd4==";
        let err = cipher().decrypt_record(legacy).expect_err("legacy");
        assert!(matches!(err, StoreError::Format { .. }));
    }

    #[test]
    fn authenticated_but_unknown_version_is_a_format_error() {
        let cipher = cipher();
        let mut forged_header = header(0);
        forged_header[4] = VERSION + 1;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .aead
            .encrypt(
                &nonce,
                Payload {
                    msg: b"{}".as_slice(),
                    aad: &forged_header,
                },
            )
            .expect("encrypt");
        let envelope = [forged_header.as_slice(), nonce.as_slice(), sealed.as_slice()].concat();

        let err = cipher.decrypt_record(&envelope).expect_err("unknown version");
        assert!(matches!(err, StoreError::Format { .. }));
    }

    #[test]
    fn reader_honours_per_envelope_compression_flag() {
        let compressing = cipher();
        let plain = cipher().with_compression(false);
        let record = sample_record();

        let sealed = compressing.encrypt_record(&record).expect("encrypt");
        assert_eq!(plain.decrypt_record(&sealed).expect("decrypt"), record);

        let sealed = plain.encrypt_record(&record).expect("encrypt");
        assert_eq!(sealed[5], 0);
        assert_eq!(compressing.decrypt_record(&sealed).expect("decrypt"), record);
    }
}
