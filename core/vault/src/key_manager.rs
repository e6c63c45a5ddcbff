//! Master key lifecycle.
//!
//! The key manager owns the device master key: it generates the key once,
//! persists it in the secure store, hands out copies while `Ready`, and
//! destroys it on `clear_key`. There is no global key; every component that
//! needs the key holds an `Arc<KeyManager>`.
//!
//! ```text
//! Uninitialized --initialize() / load()--> Ready --clear_key()--> Cleared
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use diaryvault_common::{Error, ItemName, Result};
use diaryvault_crypto::{open, seal, AuthenticatedEnvelope, MasterKey};
use diaryvault_storage::SecureStore;

/// State of the key manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No key loaded yet.
    Uninitialized,
    /// Key loaded and available.
    Ready,
    /// Key destroyed. Terminal.
    Cleared,
}

struct Inner {
    state: KeyState,
    key: Option<MasterKey>,
}

/// Owner of the device master key.
///
/// All state transitions happen under a single mutex, so concurrent
/// `initialize` and `clear_key` calls serialize cleanly.
pub struct KeyManager {
    store: Arc<dyn SecureStore>,
    item: ItemName,
    wrapping_key: Option<MasterKey>,
    inner: Mutex<Inner>,
}

fn to_key_store(e: Error) -> Error {
    match e {
        Error::KeyStore(_) => e,
        other => Error::KeyStore(other.to_string()),
    }
}

impl KeyManager {
    /// Create a key manager over a secure store item.
    ///
    /// Nothing is read until `initialize()` is called.
    pub fn new(store: Arc<dyn SecureStore>, item: ItemName) -> Self {
        Self {
            store,
            item,
            wrapping_key: None,
            inner: Mutex::new(Inner {
                state: KeyState::Uninitialized,
                key: None,
            }),
        }
    }

    /// Persist the master key sealed under `wrapping_key` instead of raw.
    ///
    /// The stored item becomes an encrypt-then-MAC envelope; a wrong
    /// wrapping key or a tampered item makes `initialize` fail.
    pub fn with_wrapping_key(mut self, wrapping_key: MasterKey) -> Self {
        self.wrapping_key = Some(wrapping_key);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state.
    pub fn state(&self) -> KeyState {
        self.lock().state
    }

    /// Whether the key is available.
    pub fn is_ready(&self) -> bool {
        self.state() == KeyState::Ready
    }

    /// Load the master key, generating and persisting one on first use.
    ///
    /// # Postconditions
    /// - State is `Ready` on success
    /// - Calling again while `Ready` is a no-op and never rotates the key
    ///
    /// # Errors
    /// - `KeyStore` if the store is unavailable, or the stored item is
    ///   corrupt or cannot be unwrapped; state stays `Uninitialized`
    /// - `NotPermitted` if the key has been cleared
    pub fn initialize(&self) -> Result<()> {
        self.open(true)
    }

    /// Load the persisted master key without ever generating one.
    ///
    /// For callers that must not mint a key as a side effect, such as
    /// reopening an existing vault.
    ///
    /// # Errors
    /// - `NotInitialized` if the store holds no master key; nothing is written
    /// - Otherwise as [`initialize`](Self::initialize)
    pub fn load(&self) -> Result<()> {
        self.open(false)
    }

    fn open(&self, generate: bool) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            KeyState::Ready => {
                debug!(item = %self.item, "Key manager already initialized");
                return Ok(());
            }
            KeyState::Cleared => {
                return Err(Error::NotPermitted(
                    "Master key has been cleared".to_string(),
                ));
            }
            KeyState::Uninitialized => {}
        }

        let stored = self.store.get_item(&self.item).map_err(to_key_store)?;
        let key = match stored {
            Some(bytes) => {
                let key = self.unwrap_key(&bytes)?;
                debug!(item = %self.item, store = self.store.name(), "Master key loaded");
                key
            }
            None if !generate => {
                return Err(Error::NotInitialized(format!(
                    "No master key in {} store under {}",
                    self.store.name(),
                    self.item
                )));
            }
            None => {
                let key = MasterKey::generate();
                let persisted = self.wrap_key(&key)?;
                self.store
                    .set_item(&self.item, &persisted)
                    .map_err(to_key_store)?;
                info!(item = %self.item, store = self.store.name(), "Generated new master key");
                key
            }
        };

        inner.key = Some(key);
        inner.state = KeyState::Ready;
        Ok(())
    }

    /// Get a copy of the master key.
    ///
    /// The copy zeroizes itself when dropped.
    ///
    /// # Errors
    /// - `NotInitialized` before `initialize()` has succeeded
    /// - `NotPermitted` after `clear_key()`
    pub fn get_key(&self) -> Result<MasterKey> {
        let inner = self.lock();
        match inner.state {
            KeyState::Ready => inner
                .key
                .clone()
                .ok_or_else(|| Error::NotInitialized("Master key not available".to_string())),
            KeyState::Uninitialized => Err(Error::NotInitialized(
                "Key manager not initialized. Call initialize() first.".to_string(),
            )),
            KeyState::Cleared => Err(Error::NotPermitted(
                "Master key has been cleared".to_string(),
            )),
        }
    }

    /// Destroy the master key, in the store and in memory.
    ///
    /// Anything encrypted under the key becomes permanently unreadable.
    /// Clearing an already cleared manager is a no-op.
    ///
    /// # Errors
    /// - `KeyStore` if the persisted item cannot be deleted; state is unchanged
    pub fn clear_key(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == KeyState::Cleared {
            return Ok(());
        }

        self.store.delete_item(&self.item).map_err(to_key_store)?;

        // MasterKey zeroizes on drop
        inner.key = None;
        inner.state = KeyState::Cleared;
        warn!(item = %self.item, "Master key cleared");
        Ok(())
    }

    fn wrap_key(&self, key: &MasterKey) -> Result<Vec<u8>> {
        match &self.wrapping_key {
            Some(kek) => Ok(seal(kek.as_bytes(), key.as_bytes())
                .map_err(to_key_store)?
                .to_bytes()),
            None => Ok(key.as_bytes().to_vec()),
        }
    }

    fn unwrap_key(&self, stored: &[u8]) -> Result<MasterKey> {
        let raw = match &self.wrapping_key {
            Some(kek) => {
                let sealed = AuthenticatedEnvelope::from_bytes(stored).map_err(|e| {
                    Error::KeyStore(format!("Stored master key is not a sealed envelope: {}", e))
                })?;
                zeroize::Zeroizing::new(open(kek.as_bytes(), &sealed).map_err(|e| {
                    Error::KeyStore(format!("Cannot unwrap stored master key: {}", e))
                })?)
            }
            None => zeroize::Zeroizing::new(stored.to_vec()),
        };
        MasterKey::from_slice(&raw)
            .map_err(|e| Error::KeyStore(format!("Stored master key is corrupt: {}", e)))
    }
}
