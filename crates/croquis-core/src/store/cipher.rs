use super::StoreError;

/// Seals and opens serialized records. Output of `encrypt_record` must be
/// self-contained: everything needed to decrypt travels inside the bytes.
pub trait RecordCipher {
    fn encrypt_record(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError>;

    fn decrypt_record(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StoreError>;
}

impl<C: RecordCipher + ?Sized> RecordCipher for &C {
    fn encrypt_record(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        (**self).encrypt_record(plaintext)
    }

    fn decrypt_record(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StoreError> {
        (**self).decrypt_record(ciphertext)
    }
}

/// XOR "cipher" for tests and smoke runs. Not cryptographically secure and does
/// not authenticate; production code uses `croquis_storage::MachineCipher`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskingCipher;

const MASK_BYTE: u8 = 0xA5;

impl RecordCipher for MaskingCipher {
    fn encrypt_record(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        Ok(mask(plaintext))
    }

    fn decrypt_record(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StoreError> {
        Ok(mask(ciphertext)) // XOR twice restores original.
    }
}

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}
