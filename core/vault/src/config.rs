//! Subsystem configuration.

use serde::{Deserialize, Serialize};

use diaryvault_common::{Error, ItemName, Result};
use diaryvault_crypto::KdfParams;

/// Secure-store item holding the master key.
pub const DEFAULT_MASTER_KEY_ITEM: &str = "diaryvault.master_key";

/// Shortest password accepted for a protected export.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Configuration file name in the application data directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// How archives are encoded when written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// `base64(salt? || iv || ciphertext)`; the caller remembers the mode.
    #[default]
    Untagged,
    /// Magic, version and mode byte in front of the untagged layout.
    Tagged,
}

/// Configuration of the encryption and backup subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsystemConfig {
    /// PBKDF2 iterations for backup passwords.
    pub kdf_iterations: u32,
    /// Length of password-derived keys in bits. Must be 256 for AES-256.
    pub key_length_bits: u32,
    /// Secure-store item name for the master key.
    pub master_key_item: String,
    /// Minimum backup password length.
    pub min_password_length: usize,
    /// Encoding used when archives are written out.
    pub archive_format: ArchiveFormat,
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: diaryvault_crypto::kdf::DEFAULT_ITERATIONS,
            key_length_bits: diaryvault_crypto::kdf::DEFAULT_KEY_LENGTH_BITS,
            master_key_item: DEFAULT_MASTER_KEY_ITEM.to_string(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            archive_format: ArchiveFormat::Untagged,
        }
    }
}

impl SubsystemConfig {
    /// KDF parameters for backup passwords.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.kdf_iterations, self.key_length_bits)
    }

    /// Validated secure-store item name.
    pub fn master_key_item(&self) -> Result<ItemName> {
        ItemName::new(self.master_key_item.clone())
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// - Invalid KDF parameters
    /// - Key length other than 256 bits (the cipher is AES-256)
    /// - Invalid item name
    pub fn validate(&self) -> Result<()> {
        self.kdf_params().validate()?;
        if self.key_length_bits != 256 {
            return Err(Error::InvalidInput(format!(
                "Backup keys must be 256 bits, configured {}",
                self.key_length_bits
            )));
        }
        self.master_key_item()?;
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}
