//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Derivation is deliberately slow: each password guess costs an attacker a
//! full iteration chain. Output is deterministic for identical inputs, which
//! is what lets an archive be decrypted from its stored salt.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::keys::DerivedKey;
use diaryvault_common::{Error, Result};

/// Default number of PBKDF2 iterations.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Default derived key length in bits.
pub const DEFAULT_KEY_LENGTH_BITS: u32 = 256;

/// Minimum accepted salt length in bytes (128 bits).
pub const MIN_SALT_LENGTH: usize = 16;

/// Largest derived key we hand out, in bits.
pub const MAX_KEY_LENGTH_BITS: u32 = 512;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC iterations.
    pub iterations: u32,
    /// Output length in bits.
    pub key_length_bits: u32,
}

impl KdfParams {
    /// Create parameters with explicit values.
    pub fn new(iterations: u32, key_length_bits: u32) -> Self {
        Self {
            iterations,
            key_length_bits,
        }
    }

    /// The parameters archives have always been written with.
    pub fn standard() -> Self {
        Self::new(DEFAULT_ITERATIONS, DEFAULT_KEY_LENGTH_BITS)
    }

    /// Output length in bytes.
    pub fn key_length(&self) -> usize {
        (self.key_length_bits / 8) as usize
    }

    /// Check the parameters are usable.
    ///
    /// # Errors
    /// - `iterations` is zero
    /// - `key_length_bits` is zero, not a multiple of 8, or above MAX_KEY_LENGTH_BITS
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidInput(
                "KDF iterations must be positive".to_string(),
            ));
        }
        if self.key_length_bits == 0
            || self.key_length_bits % 8 != 0
            || self.key_length_bits > MAX_KEY_LENGTH_BITS
        {
            return Err(Error::InvalidInput(format!(
                "Invalid key length: {} bits",
                self.key_length_bits
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a key from a password and salt using PBKDF2-HMAC-SHA256.
///
/// # Preconditions
/// - `password` must not be empty
/// - `salt` must be at least MIN_SALT_LENGTH bytes
///
/// # Postconditions
/// - Returns a key of `params.key_length()` bytes
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty
/// - Returns error if salt is too short
/// - Returns error if parameters are invalid
///
/// # Security
/// - Password is not stored or logged
/// - Blocks for the full iteration count; run it off latency-sensitive threads
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    if salt.len() < MIN_SALT_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Salt too short: expected at least {} bytes, got {}",
            MIN_SALT_LENGTH,
            salt.len()
        )));
    }
    params.validate()?;

    let mut key = vec![0u8; params.key_length()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, params.iterations, &mut key);

    Ok(DerivedKey::from_vec(key))
}

/// Derive a key with the default parameters (10000 iterations, 256 bits).
pub fn derive(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    derive_key(password, salt, &KdfParams::standard())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> KdfParams {
        KdfParams::new(1_000, 256)
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [42u8; 16];

        let key1 = derive_key("test-password-123", &salt, &quick()).unwrap();
        let key2 = derive_key("test-password-123", &salt, &quick()).unwrap();

        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 32);
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key("test-password-123", &[1u8; 16], &quick()).unwrap();
        let key2 = derive_key("test-password-123", &[2u8; 16], &quick()).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = [42u8; 16];

        let key1 = derive_key("password1", &salt, &quick()).unwrap();
        let key2 = derive_key("password2", &salt, &quick()).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_iteration_count_changes_key() {
        let key = derive_key("password", b"saltsaltsaltsalt", &KdfParams::new(1, 256)).unwrap();
        let again = derive_key("password", b"saltsaltsaltsalt", &KdfParams::new(1, 256)).unwrap();
        assert_eq!(key, again);

        let two = derive_key("password", b"saltsaltsaltsalt", &KdfParams::new(2, 256)).unwrap();
        assert_ne!(key, two);
    }

    #[test]
    fn test_default_parameters() {
        let params = KdfParams::default();
        assert_eq!(params.iterations, 10_000);
        assert_eq!(params.key_length_bits, 256);

        let key = derive("correct horse", &[0u8; 16]).unwrap();
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_key_length_honoured() {
        let key = derive_key("pw", &[5u8; 16], &KdfParams::new(10, 128)).unwrap();
        assert_eq!(key.len(), 16);

        let long = derive_key("pw", &[5u8; 16], &KdfParams::new(10, 512)).unwrap();
        assert_eq!(long.len(), 64);
        // PBKDF2 output blocks are prefixes of each other
        assert_eq!(&long.as_bytes()[..16], key.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        assert!(derive_key("", &[0u8; 16], &quick()).is_err());
    }

    #[test]
    fn test_derive_key_short_salt_fails() {
        let result = derive_key("pw", &[0u8; 8], &quick());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(KdfParams::new(0, 256).validate().is_err());
        assert!(KdfParams::new(1, 0).validate().is_err());
        assert!(KdfParams::new(1, 255).validate().is_err());
        assert!(KdfParams::new(1, 1024).validate().is_err());
        assert!(KdfParams::new(1, 256).validate().is_ok());
    }
}
