//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use diaryvault_common::{Error, Result};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of freshly generated salts in bytes (128-bit).
pub const SALT_SIZE: usize = 16;

/// Device master key.
///
/// Generated once per installation and used to encrypt private records
/// and backups that are not password protected.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a master key from a slice, checking its length.
    ///
    /// # Errors
    /// - Returns error if the slice is not exactly KEY_LENGTH bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Generate a new random master key from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Key derived from a password and salt.
///
/// Never persisted; recomputed from the stored salt whenever needed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: Vec<u8>,
}

impl DerivedKey {
    /// Wrap derived key material.
    pub fn from_vec(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.len() == other.key.len() && bool::from(self.key.ct_eq(&other.key))
    }
}

impl Eq for DerivedKey {}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED; {} bytes])", self.key.len())
    }
}

/// Salt for password-based key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SALT_SIZE {
            return Err(Error::InvalidInput(format!(
                "Invalid salt length: expected {}, got {}",
                SALT_SIZE,
                bytes.len()
            )));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(bytes);
        Ok(Self(salt))
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}
