//! Selective encryption of journal records.
//!
//! Private records are stored as a cipher envelope string under the master
//! key; public records are stored as plaintext. Reading a private record
//! yields a typed [`RecordContent`] so one unreadable record never takes a
//! whole listing down with it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use diaryvault_common::{Error, RecordId, Result};
use diaryvault_crypto::{decrypt_string, encrypt_string, CipherEnvelope};
use diaryvault_storage::{RawRecord, RecordStore};

use crate::key_manager::KeyManager;

/// A record as the application sees it: plaintext content plus its
/// privacy flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateRecord {
    pub content: String,
    pub is_private: bool,
}

impl PrivateRecord {
    pub fn new(content: impl Into<String>, is_private: bool) -> Self {
        Self {
            content: content.into(),
            is_private,
        }
    }
}

/// Result of reading a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContent {
    /// Plaintext content.
    Available(String),
    /// The content could not be decrypted; the reason is safe to display.
    Unavailable(String),
}

impl RecordContent {
    pub fn is_available(&self) -> bool {
        matches!(self, RecordContent::Available(_))
    }

    /// Plaintext, if available.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RecordContent::Available(text) => Some(text),
            RecordContent::Unavailable(_) => None,
        }
    }
}

/// Applies the privacy flag of each record when it crosses the storage
/// boundary.
pub struct SelectiveEncryptionPolicy {
    keys: Arc<KeyManager>,
    store: Arc<dyn RecordStore>,
}

impl SelectiveEncryptionPolicy {
    pub fn new(keys: Arc<KeyManager>, store: Arc<dyn RecordStore>) -> Self {
        Self { keys, store }
    }

    /// Storage form of a record.
    ///
    /// # Errors
    /// - `NotInitialized` / `NotPermitted` if the record is private and the
    ///   master key is unavailable; private content is never stored in clear
    pub fn on_write(&self, record: &PrivateRecord) -> Result<RawRecord> {
        if !record.is_private {
            return Ok(RawRecord::new(record.content.clone(), false));
        }
        let key = self.keys.get_key()?;
        let envelope = encrypt_string(key.as_bytes(), &record.content)?;
        Ok(RawRecord::new(envelope.to_base64(), true))
    }

    /// Application view of a stored record.
    pub fn on_read(&self, stored: &RawRecord) -> RecordContent {
        if !stored.is_private {
            return RecordContent::Available(stored.content.clone());
        }
        match self.decrypt_content(&stored.content) {
            Ok(text) => RecordContent::Available(text),
            Err(e) => {
                warn!(error = %e, "Private record unreadable");
                RecordContent::Unavailable(unavailable_reason(&e))
            }
        }
    }

    fn decrypt_content(&self, content: &str) -> Result<String> {
        let key = self.keys.get_key()?;
        let envelope = CipherEnvelope::from_base64(content)?;
        decrypt_string(key.as_bytes(), &envelope)
    }

    /// Encrypt as needed and persist.
    pub fn save(&self, id: &RecordId, record: &PrivateRecord) -> Result<()> {
        let raw = self.on_write(record)?;
        self.store.save_raw_record(id, &raw.content, raw.is_private)?;
        debug!(id = %id, private = raw.is_private, "Record saved");
        Ok(())
    }

    /// Load and decrypt a single record.
    ///
    /// # Errors
    /// - `NotFound` / `Storage` from the record store; decryption problems
    ///   are reported through `RecordContent::Unavailable`
    pub fn load(&self, id: &RecordId) -> Result<RecordContent> {
        let raw = self.store.load_raw_record(id)?;
        Ok(self.on_read(&raw))
    }

    /// Load many records. Unreadable private records are returned as
    /// `Unavailable` alongside the rest.
    pub fn load_all(&self, ids: &[RecordId]) -> Result<Vec<(RecordId, RecordContent)>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push((id.clone(), self.load(id)?));
        }
        let unavailable = records.iter().filter(|(_, c)| !c.is_available()).count();
        if unavailable > 0 {
            warn!(total = records.len(), unavailable, "Some records could not be decrypted");
        }
        Ok(records)
    }

    /// Change the privacy of a stored record, re-encrypting or decrypting
    /// its content.
    ///
    /// # Errors
    /// - `Decryption` if the current private content cannot be decrypted;
    ///   the stored record is left untouched
    /// - Key manager errors when the master key is needed but unavailable
    pub fn set_privacy(&self, id: &RecordId, private: bool) -> Result<()> {
        let raw = self.store.load_raw_record(id)?;
        if raw.is_private == private {
            debug!(id = %id, private, "Privacy unchanged");
            return Ok(());
        }

        let plaintext = if raw.is_private {
            self.decrypt_content(&raw.content)?
        } else {
            raw.content
        };
        self.save(id, &PrivateRecord::new(plaintext, private))?;
        info!(id = %id, private, "Record privacy changed");
        Ok(())
    }
}

fn unavailable_reason(error: &Error) -> String {
    match error {
        Error::NotInitialized(_) | Error::NotPermitted(_) => "Encryption key unavailable".to_string(),
        _ => "Content could not be decrypted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diaryvault_common::ItemName;
    use diaryvault_storage::{MemoryRecordStore, MemorySecureStore};
    use proptest::prelude::*;

    fn setup() -> (Arc<KeyManager>, Arc<MemoryRecordStore>, SelectiveEncryptionPolicy) {
        let keys = Arc::new(KeyManager::new(
            Arc::new(MemorySecureStore::new()),
            ItemName::new("master").unwrap(),
        ));
        keys.initialize().unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        let policy = SelectiveEncryptionPolicy::new(keys.clone(), store.clone());
        (keys, store, policy)
    }

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    #[test]
    fn test_public_record_stored_in_clear() {
        let (_, store, policy) = setup();
        policy.save(&id("a"), &PrivateRecord::new("sunny day", false)).unwrap();

        let raw = store.load_raw_record(&id("a")).unwrap();
        assert_eq!(raw.content, "sunny day");
        assert!(!raw.is_private);
        assert_eq!(
            policy.load(&id("a")).unwrap(),
            RecordContent::Available("sunny day".to_string())
        );
    }

    #[test]
    fn test_private_record_encrypted_at_rest() {
        let (_, store, policy) = setup();
        policy.save(&id("a"), &PrivateRecord::new("my secret", true)).unwrap();

        let raw = store.load_raw_record(&id("a")).unwrap();
        assert!(raw.is_private);
        assert!(!raw.content.contains("my secret"));
        assert!(CipherEnvelope::from_base64(&raw.content).is_ok());
        assert_eq!(policy.load(&id("a")).unwrap().as_text(), Some("my secret"));
    }

    #[test]
    fn test_private_write_without_key_fails() {
        let keys = Arc::new(KeyManager::new(
            Arc::new(MemorySecureStore::new()),
            ItemName::new("master").unwrap(),
        ));
        let store = Arc::new(MemoryRecordStore::new());
        let policy = SelectiveEncryptionPolicy::new(keys, store.clone());

        let result = policy.save(&id("a"), &PrivateRecord::new("secret", true));
        assert!(matches!(result, Err(Error::NotInitialized(_))));
        assert!(store.ids().unwrap().is_empty());

        // Public writes don't need the key
        policy.save(&id("b"), &PrivateRecord::new("hello", false)).unwrap();
    }

    #[test]
    fn test_corrupt_record_is_unavailable() {
        let (_, store, policy) = setup();
        policy.save(&id("good"), &PrivateRecord::new("fine", true)).unwrap();
        store.save_raw_record(&id("bad"), "not an envelope", true).unwrap();

        let records = policy.load_all(&[id("bad"), id("good")]).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].1.is_available());
        assert_eq!(records[1].1.as_text(), Some("fine"));
    }

    #[test]
    fn test_cleared_key_makes_private_records_unavailable() {
        let (keys, _, policy) = setup();
        policy.save(&id("a"), &PrivateRecord::new("gone", true)).unwrap();
        policy.save(&id("b"), &PrivateRecord::new("still here", false)).unwrap();

        keys.clear_key().unwrap();

        assert_eq!(
            policy.load(&id("a")).unwrap(),
            RecordContent::Unavailable("Encryption key unavailable".to_string())
        );
        assert_eq!(policy.load(&id("b")).unwrap().as_text(), Some("still here"));
    }

    #[test]
    fn test_missing_record_is_error() {
        let (_, _, policy) = setup();
        assert!(matches!(policy.load(&id("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_set_privacy_reencrypts() {
        let (_, store, policy) = setup();
        policy.save(&id("a"), &PrivateRecord::new("diary", false)).unwrap();

        policy.set_privacy(&id("a"), true).unwrap();
        let raw = store.load_raw_record(&id("a")).unwrap();
        assert!(raw.is_private);
        assert_ne!(raw.content, "diary");

        policy.set_privacy(&id("a"), false).unwrap();
        let raw = store.load_raw_record(&id("a")).unwrap();
        assert!(!raw.is_private);
        assert_eq!(raw.content, "diary");
    }

    #[test]
    fn test_set_privacy_same_value_is_noop() {
        let (_, store, policy) = setup();
        policy.save(&id("a"), &PrivateRecord::new("diary", true)).unwrap();
        let before = store.load_raw_record(&id("a")).unwrap();

        policy.set_privacy(&id("a"), true).unwrap();
        assert_eq!(store.load_raw_record(&id("a")).unwrap(), before);
    }

    #[test]
    fn test_set_privacy_on_corrupt_record_fails() {
        let (_, store, policy) = setup();
        store.save_raw_record(&id("bad"), "garbage", true).unwrap();

        assert!(matches!(
            policy.set_privacy(&id("bad"), false),
            Err(Error::Decryption(_))
        ));
        let raw = store.load_raw_record(&id("bad")).unwrap();
        assert_eq!(raw, RawRecord::new("garbage", true));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_privacy_toggle_preserves_content(content in "\\PC{0,200}") {
            let (_, store, policy) = setup();
            let rid = id("entry");
            policy.save(&rid, &PrivateRecord::new(content.clone(), false)).unwrap();

            policy.set_privacy(&rid, true).unwrap();
            prop_assert_eq!(policy.load(&rid).unwrap(), RecordContent::Available(content.clone()));
            prop_assert!(store.load_raw_record(&rid).unwrap().is_private);

            policy.set_privacy(&rid, false).unwrap();
            let raw = store.load_raw_record(&rid).unwrap();
            prop_assert_eq!(raw.content, content);
            prop_assert!(!raw.is_private);
        }
    }
}
