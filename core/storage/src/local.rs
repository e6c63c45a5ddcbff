//! Local filesystem stores.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::provider::{RawRecord, RecordStore, SecureStore};
use diaryvault_common::{Error, ItemName, RecordId, Result};

const RECORD_EXTENSION: &str = "json";

/// Write `data` to `path` through a temporary sibling and a rename, so a
/// crash never leaves a half-written file behind.
///
/// A leftover temporary from an earlier crash is removed first, so the
/// owner-only mode applies to a freshly created file. The temporary is
/// removed again if any step fails.
fn write_atomic(path: &Path, data: &[u8], private: bool) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    match fs::remove_file(&tmp) {
        Ok(()) => debug!(path = %tmp.display(), "Removed stale temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let result = write_new(&tmp, data, private).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_new(path: &Path, data: &[u8], private: bool) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Secure store backed by one file per item in a local directory.
///
/// Files are created with owner-only permissions on Unix. This is the
/// fallback for hosts without a platform keychain.
pub struct LocalSecureStore {
    root: PathBuf,
}

impl LocalSecureStore {
    /// Create a store rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Returns `KeyStore` if the directory cannot be created
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                Error::KeyStore(format!("Cannot create key directory {}: {}", root.display(), e))
            })?;
        }
        Ok(Self { root })
    }

    fn item_path(&self, name: &ItemName) -> PathBuf {
        self.root.join(name.as_str())
    }
}

impl SecureStore for LocalSecureStore {
    fn name(&self) -> &str {
        "local"
    }

    fn get_item(&self, name: &ItemName) -> Result<Option<Vec<u8>>> {
        let path = self.item_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::KeyStore(format!("Cannot read item {}: {}", name, e))),
        }
    }

    fn set_item(&self, name: &ItemName, value: &[u8]) -> Result<()> {
        debug!(item = %name, "Writing secure item");
        write_atomic(&self.item_path(name), value, true)
            .map_err(|e| Error::KeyStore(format!("Cannot write item {}: {}", name, e)))
    }

    fn delete_item(&self, name: &ItemName) -> Result<()> {
        debug!(item = %name, "Deleting secure item");
        match fs::remove_file(self.item_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::KeyStore(format!("Cannot delete item {}: {}", name, e))),
        }
    }
}

/// Record store keeping one JSON file per record.
pub struct LocalRecordStore {
    root: PathBuf,
}

impl LocalRecordStore {
    /// Create a record store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    fn record_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(format!("{}.{}", id.as_str(), RECORD_EXTENSION))
    }

    /// Ids of all stored records, sorted.
    pub fn ids(&self) -> Result<Vec<RecordId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(RecordId::new(stem)?);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl RecordStore for LocalRecordStore {
    fn name(&self) -> &str {
        "local"
    }

    fn load_raw_record(&self, id: &RecordId) -> Result<RawRecord> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("Record not found: {}", id)));
            }
            Err(e) => return Err(Error::Storage(format!("Cannot read record {}: {}", id, e))),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_raw_record(&self, id: &RecordId, content: &str, is_private: bool) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&RawRecord::new(content, is_private))?;
        write_atomic(&self.record_path(id), &bytes, is_private)
            .map_err(|e| Error::Storage(format!("Cannot write record {}: {}", id, e)))
    }
}
