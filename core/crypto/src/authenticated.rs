//! Encrypt-then-MAC envelopes.
//!
//! Wraps a [`CipherEnvelope`] with an HMAC-SHA256 tag over `iv || ciphertext`.
//! Encryption and MAC subkeys are split from the caller's key with HMAC and
//! distinct labels, so the same key is never used for both purposes. The tag
//! is checked before any decryption happens.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use crate::cipher::{self, CipherEnvelope, BLOCK_SIZE, IV_SIZE};
use crate::integrity::{self, DIGEST_SIZE};
use crate::keys::KEY_LENGTH;
use diaryvault_common::{Error, Result};

const ENC_LABEL: &[u8] = b"diaryvault.seal.enc.v1";
const MAC_LABEL: &[u8] = b"diaryvault.seal.mac.v1";

/// A ciphertext envelope plus its authentication tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedEnvelope {
    envelope: CipherEnvelope,
    tag: [u8; DIGEST_SIZE],
}

impl AuthenticatedEnvelope {
    /// The wrapped ciphertext envelope.
    pub fn envelope(&self) -> &CipherEnvelope {
        &self.envelope
    }

    /// The HMAC tag.
    pub fn tag(&self) -> &[u8; DIGEST_SIZE] {
        &self.tag
    }

    /// Encode as `iv || ciphertext || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.envelope.to_bytes();
        out.extend_from_slice(&self.tag);
        out
    }

    /// Decode from `iv || ciphertext || tag`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_SIZE + BLOCK_SIZE + DIGEST_SIZE {
            return Err(Error::Decryption(format!(
                "Sealed envelope too short: {} bytes",
                bytes.len()
            )));
        }
        let (body, tag_bytes) = bytes.split_at(bytes.len() - DIGEST_SIZE);
        let envelope = CipherEnvelope::from_bytes(body)?;
        let mut tag = [0u8; DIGEST_SIZE];
        tag.copy_from_slice(tag_bytes);
        Ok(Self { envelope, tag })
    }

    /// Encode as base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode from base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Decryption(format!("Sealed envelope is not valid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

fn subkey(key: &[u8], label: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if key.len() != KEY_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(Zeroizing::new(integrity::hmac(label, key)?))
}

/// Encrypt and authenticate `plaintext` under `key`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<AuthenticatedEnvelope> {
    let enc_key = subkey(key, ENC_LABEL)?;
    let mac_key = subkey(key, MAC_LABEL)?;

    let envelope = cipher::encrypt(enc_key.as_slice(), plaintext)?;
    let tag = integrity::hmac(&envelope.to_bytes(), mac_key.as_slice())?;

    Ok(AuthenticatedEnvelope { envelope, tag })
}

/// Verify and decrypt a sealed envelope.
///
/// # Errors
/// - Returns `Decryption` if the tag does not verify (any mutation or wrong key)
/// - Returns `Decryption` if the padding is invalid
pub fn open(key: &[u8], sealed: &AuthenticatedEnvelope) -> Result<Vec<u8>> {
    let enc_key = subkey(key, ENC_LABEL)?;
    let mac_key = subkey(key, MAC_LABEL)?;

    if !integrity::verify_hmac(&sealed.envelope.to_bytes(), &sealed.tag, mac_key.as_slice()) {
        return Err(Error::Decryption(
            "Authentication tag mismatch".to_string(),
        ));
    }

    cipher::decrypt(enc_key.as_slice(), &sealed.envelope)
}
