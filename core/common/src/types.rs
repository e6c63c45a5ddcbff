//! Common types used throughout DiaryVault.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a journal record as known to the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new RecordId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    /// - Returns error if id contains path separators
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "RecordId cannot be empty".to_string(),
            ));
        }
        if id.contains('/') || id.contains('\\') {
            return Err(crate::Error::InvalidInput(
                "RecordId cannot contain separators".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an item in the secure key store.
///
/// Restricted to ASCII letters, digits, `.`, `_` and `-` so that every
/// backend can map it to a file name or keychain label without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemName(String);

impl ItemName {
    /// Create a validated item name.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Item name cannot be empty".to_string(),
            ));
        }
        if name == "." || name == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Item name not allowed: {}",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(crate::Error::InvalidInput(format!(
                "Item name contains invalid characters: {}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_creation() {
        let id = RecordId::new("entry-1").unwrap();
        assert_eq!(id.as_str(), "entry-1");
        assert_eq!(id.to_string(), "entry-1");
    }

    #[test]
    fn test_record_id_empty_fails() {
        assert!(RecordId::new("").is_err());
    }

    #[test]
    fn test_record_id_separator_fails() {
        assert!(RecordId::new("../escape").is_err());
        assert!(RecordId::new("a\\b").is_err());
    }

    #[test]
    fn test_item_name_validation() {
        assert!(ItemName::new("diaryvault.master_key").is_ok());
        assert!(ItemName::new("key-v2").is_ok());
        assert!(ItemName::new("").is_err());
        assert!(ItemName::new("..").is_err());
        assert!(ItemName::new("has space").is_err());
        assert!(ItemName::new("a/b").is_err());
    }

    proptest::proptest! {
        #[test]
        fn test_item_name_accepts_safe_charset(name in "[A-Za-z0-9_-][A-Za-z0-9._-]{0,31}") {
            proptest::prop_assert!(ItemName::new(name).is_ok());
        }
    }
}
