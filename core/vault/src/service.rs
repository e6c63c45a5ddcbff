//! Application-facing entry point to the encryption subsystem.

use std::sync::Arc;

use tracing::debug;

use diaryvault_common::Result;
use diaryvault_crypto::{decrypt_string, encrypt_string, CipherEnvelope, DerivedKey, Salt};
use diaryvault_storage::{RecordStore, SecureStore};

use crate::backup::{BackupArchive, BackupCodec};
use crate::config::SubsystemConfig;
use crate::key_manager::KeyManager;
use crate::models::BackupDataset;
use crate::policy::SelectiveEncryptionPolicy;

/// Everything the application needs from the encryption subsystem, wired
/// around a single key manager.
pub struct DiaryCrypto {
    keys: Arc<KeyManager>,
    policy: SelectiveEncryptionPolicy,
    codec: BackupCodec,
}

impl DiaryCrypto {
    /// Wire up the subsystem. The master key is not loaded until
    /// [`initialize`](Self::initialize).
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(
        config: SubsystemConfig,
        secure_store: Arc<dyn SecureStore>,
        record_store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        config.validate()?;
        let keys = Arc::new(KeyManager::new(secure_store, config.master_key_item()?));
        Self::with_key_manager(keys, config, record_store)
    }

    /// Wire up the subsystem around an existing key manager.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_key_manager(
        keys: Arc<KeyManager>,
        config: SubsystemConfig,
        record_store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        Ok(Self {
            policy: SelectiveEncryptionPolicy::new(keys.clone(), record_store),
            codec: BackupCodec::new(keys.clone(), config)?,
            keys,
        })
    }

    /// Load or create the master key.
    pub fn initialize(&self) -> Result<()> {
        self.keys.initialize()
    }

    /// Load an existing master key; `NotInitialized` if there is none.
    pub fn load(&self) -> Result<()> {
        self.keys.load()
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn policy(&self) -> &SelectiveEncryptionPolicy {
        &self.policy
    }

    pub fn codec(&self) -> &BackupCodec {
        &self.codec
    }

    /// Encrypt a field under the master key, returning its envelope string.
    pub fn encrypt_for_storage(&self, plaintext: &str) -> Result<String> {
        let key = self.keys.get_key()?;
        let envelope = encrypt_string(key.as_bytes(), plaintext)?;
        debug!(len = plaintext.len(), "Field encrypted for storage");
        Ok(envelope.to_base64())
    }

    /// Decrypt an envelope string produced by
    /// [`encrypt_for_storage`](Self::encrypt_for_storage).
    pub fn decrypt_from_storage(&self, envelope: &str) -> Result<String> {
        let key = self.keys.get_key()?;
        let envelope = CipherEnvelope::from_base64(envelope)?;
        decrypt_string(key.as_bytes(), &envelope)
    }

    pub fn export_backup(
        &self,
        dataset: &BackupDataset,
        password: Option<&str>,
    ) -> Result<BackupArchive> {
        self.codec.export(dataset, password)
    }

    pub fn import_backup(
        &self,
        archive: &BackupArchive,
        password: Option<&str>,
    ) -> Result<BackupDataset> {
        self.codec.import(archive, password)
    }

    /// Derive a backup key from a password and salt with the configured
    /// KDF parameters.
    pub fn derive_backup_key(&self, password: &str, salt: &Salt) -> Result<DerivedKey> {
        self.codec.derive_key(password, salt)
    }
}
