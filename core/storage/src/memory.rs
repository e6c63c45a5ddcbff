//! In-memory stores for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::provider::{RawRecord, RecordStore, SecureStore};
use diaryvault_common::{Error, ItemName, RecordId, Result};

/// In-memory secure store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Availability can be switched off to simulate a
/// locked or denied keychain.
pub struct MemorySecureStore {
    items: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    available: AtomicBool,
}

impl MemorySecureStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call succeed or fail with `KeyStore`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    /// Whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::KeyStore("Secure store unavailable".to_string()))
        }
    }
}

impl Default for MemorySecureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for MemorySecureStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_item(&self, name: &ItemName) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let items = self
            .items
            .read()
            .map_err(|_| Error::KeyStore("Secure store lock poisoned".to_string()))?;
        Ok(items.get(name.as_str()).cloned())
    }

    fn set_item(&self, name: &ItemName, value: &[u8]) -> Result<()> {
        self.check_available()?;
        self.items
            .write()
            .map_err(|_| Error::KeyStore("Secure store lock poisoned".to_string()))?
            .insert(name.as_str().to_string(), value.to_vec());
        Ok(())
    }

    fn delete_item(&self, name: &ItemName) -> Result<()> {
        self.check_available()?;
        self.items
            .write()
            .map_err(|_| Error::KeyStore("Secure store lock poisoned".to_string()))?
            .remove(name.as_str());
        Ok(())
    }
}

/// In-memory record store.
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<RecordId, RawRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty record store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Ids of all stored records, sorted.
    pub fn ids(&self) -> Result<Vec<RecordId>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Storage("Record store lock poisoned".to_string()))?;
        let mut ids: Vec<RecordId> = records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_raw_record(&self, id: &RecordId) -> Result<RawRecord> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Storage("Record store lock poisoned".to_string()))?;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))
    }

    fn save_raw_record(&self, id: &RecordId, content: &str, is_private: bool) -> Result<()> {
        self.records
            .write()
            .map_err(|_| Error::Storage("Record store lock poisoned".to_string()))?
            .insert(id.clone(), RawRecord::new(content, is_private));
        Ok(())
    }
}
