//! Collaborator traits for the storage the subsystem is plugged into.
//!
//! Two stores are consumed: a protected key store holding the master key,
//! and the record store that persists journal entries. Neither trait
//! exposes storage structure; the subsystem only hands bytes and record
//! content across.

use serde::{Deserialize, Serialize};

use diaryvault_common::{ItemName, RecordId, Result};

/// Protected storage for small secrets (keychain, keystore, secure file).
///
/// Implementations report backend failures as `Error::KeyStore`.
pub trait SecureStore: Send + Sync {
    /// Get the backend name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Read an item.
    ///
    /// # Returns
    /// - `Ok(None)` if no item with this name exists
    ///
    /// # Errors
    /// - Store unavailable or access denied
    fn get_item(&self, name: &ItemName) -> Result<Option<Vec<u8>>>;

    /// Create or replace an item.
    ///
    /// # Errors
    /// - Store unavailable or access denied
    fn set_item(&self, name: &ItemName, value: &[u8]) -> Result<()>;

    /// Delete an item. Deleting a missing item is not an error.
    ///
    /// # Errors
    /// - Store unavailable or access denied
    fn delete_item(&self, name: &ItemName) -> Result<()>;
}

/// A record as the storage layer holds it.
///
/// For private records `content` is an envelope string; for public records
/// it is plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Plaintext or envelope string.
    pub content: String,
    /// Whether the record is private.
    pub is_private: bool,
}

impl RawRecord {
    /// Create a raw record.
    pub fn new(content: impl Into<String>, is_private: bool) -> Self {
        Self {
            content: content.into(),
            is_private,
        }
    }
}

/// The record persistence layer, consumed only through these two calls.
///
/// Implementations report backend failures as `Error::Storage` and missing
/// records as `Error::NotFound`.
pub trait RecordStore: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Load a record by id.
    ///
    /// # Errors
    /// - Record not found
    /// - Backend failure
    fn load_raw_record(&self, id: &RecordId) -> Result<RawRecord>;

    /// Save a record, replacing any previous version.
    fn save_raw_record(&self, id: &RecordId, content: &str, is_private: bool) -> Result<()>;
}
