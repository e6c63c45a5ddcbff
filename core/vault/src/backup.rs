//! Encrypted backup archives.
//!
//! An archive is the whole [`BackupDataset`] serialized to JSON and encrypted
//! either under a key derived from a user password or under the device
//! master key.
//!
//! # Layout
//! ```text
//! untagged: base64( [salt(16)] || iv(16) || ciphertext )
//! tagged:   base64( "DVB" || version(1) || mode(1) || untagged bytes )
//! ```
//! The untagged form does not record whether a salt is present, so the
//! caller must know how the archive was made. The tagged form carries that
//! in the mode byte.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info, warn};

use diaryvault_common::{Error, Result};
use diaryvault_crypto::{
    decrypt, derive_key, encrypt, CipherEnvelope, DerivedKey, Salt, BLOCK_SIZE, IV_SIZE,
    SALT_SIZE,
};

use crate::config::{ArchiveFormat, SubsystemConfig};
use crate::key_manager::KeyManager;
use crate::models::BackupDataset;

/// Magic prefix of tagged archives.
pub const ARCHIVE_MAGIC: &[u8; 3] = b"DVB";

/// Current tagged archive version.
pub const ARCHIVE_VERSION: u8 = 1;

const TAG_HEADER_SIZE: usize = ARCHIVE_MAGIC.len() + 2;

/// Which key protects an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Encrypted under the device master key.
    DeviceKey,
    /// Encrypted under a password-derived key.
    Password,
}

impl ArchiveMode {
    fn to_byte(self) -> u8 {
        match self {
            ArchiveMode::DeviceKey => 0,
            ArchiveMode::Password => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ArchiveMode::DeviceKey),
            1 => Ok(ArchiveMode::Password),
            other => Err(Error::Format(format!("Unknown archive mode {}", other))),
        }
    }
}

/// An encrypted backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    salt: Option<Salt>,
    envelope: CipherEnvelope,
}

impl BackupArchive {
    pub fn new(salt: Option<Salt>, envelope: CipherEnvelope) -> Self {
        Self { salt, envelope }
    }

    /// Salt, present only for password-protected archives.
    pub fn salt(&self) -> Option<&Salt> {
        self.salt.as_ref()
    }

    pub fn envelope(&self) -> &CipherEnvelope {
        &self.envelope
    }

    pub fn mode(&self) -> ArchiveMode {
        if self.salt.is_some() {
            ArchiveMode::Password
        } else {
            ArchiveMode::DeviceKey
        }
    }

    pub fn is_password_protected(&self) -> bool {
        self.salt.is_some()
    }

    /// Untagged byte layout: `[salt] || iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SALT_SIZE + IV_SIZE + self.envelope.ciphertext().len());
        if let Some(salt) = &self.salt {
            bytes.extend_from_slice(salt.as_bytes());
        }
        bytes.extend_from_slice(&self.envelope.to_bytes());
        bytes
    }

    /// Parse the untagged byte layout.
    ///
    /// `password_protected` says whether the leading 16 bytes are a salt.
    ///
    /// # Errors
    /// - `Format` if the bytes are too short or the ciphertext is not a
    ///   whole number of blocks
    pub fn from_bytes(bytes: &[u8], password_protected: bool) -> Result<Self> {
        let (salt, body) = if password_protected {
            if bytes.len() < SALT_SIZE {
                return Err(Error::Format("Archive too short for a salt".to_string()));
            }
            let (salt, body) = bytes.split_at(SALT_SIZE);
            (Some(Salt::from_slice(salt)?), body)
        } else {
            (None, bytes)
        };

        if body.len() < IV_SIZE + BLOCK_SIZE {
            return Err(Error::Format(format!(
                "Archive body is {} bytes, need at least {}",
                body.len(),
                IV_SIZE + BLOCK_SIZE
            )));
        }
        let envelope = CipherEnvelope::from_bytes(body)
            .map_err(|e| Error::Format(format!("Malformed archive: {}", e)))?;
        Ok(Self { salt, envelope })
    }

    /// Untagged text form.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Parse the untagged text form.
    pub fn from_base64(encoded: &str, password_protected: bool) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Format(format!("Archive is not valid base64: {}", e)))?;
        Self::from_bytes(&bytes, password_protected)
    }

    /// Tagged text form, self-describing.
    pub fn encode_tagged(&self) -> String {
        let mut bytes = Vec::with_capacity(TAG_HEADER_SIZE + SALT_SIZE + self.envelope.to_bytes().len());
        bytes.extend_from_slice(ARCHIVE_MAGIC);
        bytes.push(ARCHIVE_VERSION);
        bytes.push(self.mode().to_byte());
        bytes.extend_from_slice(&self.to_bytes());
        STANDARD.encode(bytes)
    }

    /// Parse the tagged text form.
    ///
    /// # Errors
    /// - `Format` on bad base64, missing magic, unsupported version, unknown
    ///   mode, or a malformed body
    pub fn decode_tagged(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Format(format!("Archive is not valid base64: {}", e)))?;
        if bytes.len() < TAG_HEADER_SIZE || &bytes[..ARCHIVE_MAGIC.len()] != ARCHIVE_MAGIC {
            return Err(Error::Format("Not a tagged archive".to_string()));
        }
        let version = bytes[ARCHIVE_MAGIC.len()];
        if version != ARCHIVE_VERSION {
            return Err(Error::Format(format!(
                "Unsupported archive version {}",
                version
            )));
        }
        let mode = ArchiveMode::from_byte(bytes[ARCHIVE_MAGIC.len() + 1])?;
        Self::from_bytes(&bytes[TAG_HEADER_SIZE..], mode == ArchiveMode::Password)
    }

    /// Text form in the given format.
    pub fn encode(&self, format: ArchiveFormat) -> String {
        match format {
            ArchiveFormat::Untagged => self.to_base64(),
            ArchiveFormat::Tagged => self.encode_tagged(),
        }
    }

    /// Parse the text form in the given format.
    ///
    /// `password_protected` is only consulted for untagged archives.
    pub fn decode(encoded: &str, format: ArchiveFormat, password_protected: bool) -> Result<Self> {
        match format {
            ArchiveFormat::Untagged => Self::from_base64(encoded, password_protected),
            ArchiveFormat::Tagged => Self::decode_tagged(encoded),
        }
    }
}

/// Exports and imports backup archives.
pub struct BackupCodec {
    keys: Arc<KeyManager>,
    config: SubsystemConfig,
    issued_salts: Mutex<HashSet<Salt>>,
}

impl BackupCodec {
    /// Create a codec.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(keys: Arc<KeyManager>, config: SubsystemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys,
            config,
            issued_salts: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &SubsystemConfig {
        &self.config
    }

    /// Derive the archive key for a password and salt with the configured
    /// KDF parameters.
    pub fn derive_key(&self, password: &str, salt: &Salt) -> Result<DerivedKey> {
        derive_key(password, salt.as_bytes(), &self.config.kdf_params())
    }

    /// Encrypt a dataset into an archive.
    ///
    /// With a password the archive carries a fresh random salt; without one
    /// it is encrypted under the master key.
    ///
    /// # Errors
    /// - `InvalidInput` if the password is shorter than the configured minimum
    /// - `NotInitialized` / `NotPermitted` without a password when the master
    ///   key is unavailable
    pub fn export(&self, dataset: &BackupDataset, password: Option<&str>) -> Result<BackupArchive> {
        match password {
            Some(password) => self.export_with_salt(dataset, password, Salt::generate()),
            None => {
                let key = self.keys.get_key()?;
                let envelope = encrypt(key.as_bytes(), &self.serialize(dataset)?)?;
                info!(id = %dataset.id, summary = %dataset.summary(), "Backup exported under device key");
                Ok(BackupArchive::new(None, envelope))
            }
        }
    }

    /// Password export with a caller-chosen salt.
    ///
    /// The salt counts as issued only once the archive has been produced,
    /// so a failed export can be retried with the same salt.
    ///
    /// # Errors
    /// - `SaltReuse` if this codec has already issued `salt`
    /// - `InvalidInput` if the password is too short
    pub fn export_with_salt(
        &self,
        dataset: &BackupDataset,
        password: &str,
        salt: Salt,
    ) -> Result<BackupArchive> {
        self.check_password(password)?;
        if self.issued().contains(&salt) {
            return Err(salt_reuse());
        }

        let key = self.derive_key(password, &salt)?;
        let envelope = encrypt(key.as_bytes(), &self.serialize(dataset)?)?;

        // Another export may have issued the salt meanwhile
        if !self.issued().insert(salt) {
            return Err(salt_reuse());
        }
        info!(id = %dataset.id, summary = %dataset.summary(), "Backup exported under password");
        Ok(BackupArchive::new(Some(salt), envelope))
    }

    /// Decrypt and validate an archive.
    ///
    /// Nothing is returned unless the payload decrypts, parses, and passes
    /// [`validate`](Self::validate).
    ///
    /// # Errors
    /// - `Format` if a password is given for a device-key archive or missing
    ///   for a password archive, or if the dataset fails validation
    /// - `Decryption` on a wrong password, wrong device key, or corrupted
    ///   ciphertext
    pub fn import(&self, archive: &BackupArchive, password: Option<&str>) -> Result<BackupDataset> {
        let plaintext = match (archive.salt(), password) {
            (Some(salt), Some(password)) => {
                let key = self.derive_key(password, salt)?;
                decrypt(key.as_bytes(), archive.envelope())?
            }
            (None, None) => {
                let key = self.keys.get_key()?;
                decrypt(key.as_bytes(), archive.envelope())?
            }
            (Some(_), None) => {
                return Err(Error::Format(
                    "Archive is password protected but no password was given".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(Error::Format(
                    "Archive is not password protected but a password was given".to_string(),
                ));
            }
        };
        let plaintext = zeroize::Zeroizing::new(plaintext);

        // Valid padding under a wrong key happens; an unparseable payload
        // means the same thing.
        let dataset: BackupDataset = serde_json::from_slice(&plaintext).map_err(|e| {
            debug!(error = %e, "Decrypted archive payload is not a dataset");
            Error::Decryption("Wrong password or corrupted archive".to_string())
        })?;

        if let Err(problem) = dataset.check() {
            warn!(id = %dataset.id, problem = %problem, "Imported dataset failed validation");
            return Err(Error::Format(format!("Invalid backup dataset: {}", problem)));
        }

        info!(id = %dataset.id, summary = %dataset.summary(), "Backup imported");
        Ok(dataset)
    }

    /// Whether a dataset is structurally sound.
    pub fn validate(&self, dataset: &BackupDataset) -> bool {
        dataset.check().is_ok()
    }

    fn serialize(&self, dataset: &BackupDataset) -> Result<zeroize::Zeroizing<Vec<u8>>> {
        Ok(zeroize::Zeroizing::new(serde_json::to_vec(dataset)?))
    }

    fn check_password(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        if length < self.config.min_password_length {
            return Err(Error::InvalidInput(format!(
                "Backup password must be at least {} characters",
                self.config.min_password_length
            )));
        }
        Ok(())
    }

    fn issued(&self) -> MutexGuard<'_, HashSet<Salt>> {
        self.issued_salts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn salt_reuse() -> Error {
    Error::SaltReuse("Salt was already used for another archive".to_string())
}
