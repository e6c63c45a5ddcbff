//! Symmetric encryption using AES-256-CBC with PKCS#7 padding.
//!
//! Every call draws a fresh 16-byte IV from the OS CSPRNG, so encrypting the
//! same plaintext twice under the same key yields different envelopes.
//! CBC carries no authentication tag: tampering is detected by padding
//! validation only. Use [`crate::authenticated`] where mutation must be
//! caught deterministically.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::keys::KEY_LENGTH;
use diaryvault_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV size for AES-CBC (16 bytes).
pub const IV_SIZE: usize = 16;

/// AES block size (16 bytes).
pub const BLOCK_SIZE: usize = 16;

/// The unit produced by one encryption call: `{iv, ciphertext}`.
///
/// Serialized as base64 of `iv || ciphertext`. No length prefix is needed
/// because the IV length is fixed.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    iv: [u8; IV_SIZE],
    ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    /// Assemble an envelope from its parts.
    pub fn new(iv: [u8; IV_SIZE], ciphertext: Vec<u8>) -> Self {
        Self { iv, ciphertext }
    }

    /// The initialization vector.
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// The ciphertext, without IV.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Encode as `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode from `iv || ciphertext`.
    ///
    /// # Errors
    /// - Returns `Decryption` if the input is shorter than IV + one block
    /// - Returns `Decryption` if the ciphertext is not block aligned
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_SIZE + BLOCK_SIZE {
            return Err(Error::Decryption(format!(
                "Envelope too short: {} bytes",
                bytes.len()
            )));
        }
        let (iv_bytes, ciphertext) = bytes.split_at(IV_SIZE);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(iv_bytes);
        let envelope = Self::new(iv, ciphertext.to_vec());
        envelope.check_shape()?;
        Ok(envelope)
    }

    /// Encode as the storage wire format: base64 of `iv || ciphertext`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode from the storage wire format.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Decryption(format!("Envelope is not valid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    fn check_shape(&self) -> Result<()> {
        if self.ciphertext.is_empty() || self.ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::Decryption(format!(
                "Ciphertext length {} is not a positive multiple of {}",
                self.ciphertext.len(),
                BLOCK_SIZE
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for CipherEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherEnvelope")
            .field("iv", &hex::encode(self.iv))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}

/// Draw a fresh IV from the OS CSPRNG.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt plaintext using AES-256-CBC.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
/// - `plaintext` can be any size, including empty
///
/// # Postconditions
/// - Returns an envelope with a freshly generated IV
/// - Ciphertext length is plaintext length rounded up to the next full block
///
/// # Errors
/// - Returns error if key length is incorrect
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<CipherEnvelope> {
    check_key(key)?;

    let iv = generate_iv();
    let cipher = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| Error::InvalidInput(format!("Cipher init failed: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(CipherEnvelope::new(iv, ciphertext))
}

/// Decrypt an envelope using AES-256-CBC.
///
/// # Errors
/// - Returns `InvalidInput` if key length is incorrect
/// - Returns `Decryption` if the envelope is malformed
/// - Returns `Decryption` if padding is invalid after decryption (wrong key,
///   corrupted or truncated ciphertext)
pub fn decrypt(key: &[u8], envelope: &CipherEnvelope) -> Result<Vec<u8>> {
    check_key(key)?;
    envelope.check_shape()?;

    let cipher = Aes256CbcDec::new_from_slices(key, envelope.iv())
        .map_err(|e| Error::InvalidInput(format!("Cipher init failed: {}", e)))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(envelope.ciphertext())
        .map_err(|_| Error::Decryption("Invalid padding".to_string()))
}

/// Encrypt a UTF-8 string.
pub fn encrypt_string(key: &[u8], plaintext: &str) -> Result<CipherEnvelope> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypt an envelope into a UTF-8 string.
///
/// Invalid UTF-8 after decryption is reported as `Decryption`: it means the
/// key was wrong even though the padding happened to check out.
pub fn decrypt_string(key: &[u8], envelope: &CipherEnvelope) -> Result<String> {
    let plaintext = decrypt(key, envelope)?;
    String::from_utf8(plaintext)
        .map_err(|_| Error::Decryption("Plaintext is not valid UTF-8".to_string()))
}

/// Serialize a value to JSON and encrypt it.
pub fn encrypt_object<T: Serialize>(key: &[u8], value: &T) -> Result<CipherEnvelope> {
    let json = serde_json::to_vec(value)?;
    encrypt(key, &json)
}

/// Decrypt an envelope and deserialize the JSON inside.
pub fn decrypt_object<T: DeserializeOwned>(key: &[u8], envelope: &CipherEnvelope) -> Result<T> {
    let json = decrypt(key, envelope)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Hello, World!";

        let envelope = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &envelope).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = [42u8; KEY_LENGTH];

        // Padding always adds at least one byte
        assert_eq!(encrypt(&key, b"").unwrap().ciphertext().len(), 16);
        assert_eq!(encrypt(&key, &[0u8; 15]).unwrap().ciphertext().len(), 16);
        assert_eq!(encrypt(&key, &[0u8; 16]).unwrap().ciphertext().len(), 32);
    }

    #[test]
    fn test_different_iv_each_time() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Same plaintext";

        let env1 = encrypt(&key, plaintext).unwrap();
        let env2 = encrypt(&key, plaintext).unwrap();

        assert_ne!(env1.iv(), env2.iv());
        assert_ne!(env1, env2);
        assert_ne!(env1.to_base64(), env2.to_base64());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = [1u8; KEY_LENGTH];
        let key2 = [2u8; KEY_LENGTH];

        let envelope = encrypt_string(&key1, "Secret data for the diary").unwrap();
        let result = decrypt_string(&key2, &envelope);

        assert!(matches!(result, Err(Error::Decryption(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_LENGTH];
        // 20 bytes: two blocks, the second ends in twelve 0x0c padding bytes
        let plaintext = b"twenty bytes of text";

        let envelope = encrypt(&key, plaintext).unwrap();
        let mut bytes = envelope.to_bytes();
        // Flipping the last byte of the first ciphertext block flips the
        // last padding byte of the second plaintext block
        bytes[IV_SIZE + 15] ^= 0x01;

        let tampered = CipherEnvelope::from_bytes(&bytes).unwrap();
        assert!(matches!(decrypt(&key, &tampered), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_tampered_iv_fails() {
        let key = [42u8; KEY_LENGTH];
        let envelope = encrypt(&key, b"hello diary").unwrap();

        let mut iv = *envelope.iv();
        iv[15] ^= 0x01;
        let tampered = CipherEnvelope::new(iv, envelope.ciphertext().to_vec());

        assert!(matches!(decrypt(&key, &tampered), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_truncated_envelope_fails() {
        let key = [42u8; KEY_LENGTH];
        let envelope = encrypt(&key, &[7u8; 40]).unwrap();
        let bytes = envelope.to_bytes();

        // Not block aligned
        assert!(matches!(
            CipherEnvelope::from_bytes(&bytes[..bytes.len() - 3]),
            Err(Error::Decryption(_))
        ));
        // IV only
        assert!(matches!(
            CipherEnvelope::from_bytes(&bytes[..IV_SIZE]),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_malformed_envelope_rejected_by_decrypt() {
        let key = [42u8; KEY_LENGTH];
        let envelope = CipherEnvelope::new([0u8; IV_SIZE], vec![1, 2, 3]);
        assert!(matches!(decrypt(&key, &envelope), Err(Error::Decryption(_))));

        let empty = CipherEnvelope::new([0u8; IV_SIZE], Vec::new());
        assert!(matches!(decrypt(&key, &empty), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];

        assert!(matches!(encrypt(&short_key, b"data"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_base64_wire_format() {
        let key = [42u8; KEY_LENGTH];
        let envelope = encrypt(&key, b"wire").unwrap();

        let encoded = envelope.to_base64();
        let raw = STANDARD.decode(&encoded).unwrap();
        assert_eq!(&raw[..IV_SIZE], envelope.iv());
        assert_eq!(&raw[IV_SIZE..], envelope.ciphertext());

        let decoded = CipherEnvelope::from_base64(&encoded).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_invalid_base64_is_decryption_error() {
        assert!(matches!(
            CipherEnvelope::from_base64("not base64 at all!!"),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_string_roundtrip_unicode() {
        let key = [5u8; KEY_LENGTH];
        let text = "今天天气很好 ☀️ dear diary";

        let envelope = encrypt_string(&key, text).unwrap();
        assert_eq!(decrypt_string(&key, &envelope).unwrap(), text);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        tags: Vec<String>,
        private: bool,
    }

    #[test]
    fn test_object_roundtrip() {
        let key = [6u8; KEY_LENGTH];
        let note = Note {
            title: "Walk".to_string(),
            tags: vec!["outdoors".to_string(), "calm".to_string()],
            private: true,
        };

        let envelope = encrypt_object(&key, &note).unwrap();
        let restored: Note = decrypt_object(&key, &envelope).unwrap();

        assert_eq!(restored, note);
    }

    #[test]
    fn test_debug_does_not_leak_ciphertext() {
        let envelope = CipherEnvelope::new([0u8; IV_SIZE], vec![0xAB; 32]);
        let debug = format!("{:?}", envelope);
        assert!(debug.contains("ciphertext_len: 32"));
        assert!(!debug.contains("abab"));
    }

    proptest! {
        #[test]
        fn test_roundtrip_arbitrary_bytes(
            key in proptest::array::uniform32(any::<u8>()),
            data in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            let envelope = encrypt(&key, &data).unwrap();
            let restored = CipherEnvelope::from_base64(&envelope.to_base64()).unwrap();
            prop_assert_eq!(decrypt(&key, &restored).unwrap(), data);
        }
    }
}
