//! Common error types for DiaryVault.

use thiserror::Error;

/// Top-level error type for DiaryVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The key manager was used before `initialize()` succeeded.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Decryption failed: wrong key, corrupted or truncated ciphertext,
    /// or a malformed envelope.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Archive shape or payload is not what the caller expected.
    #[error("Format error: {0}")]
    Format(String),

    /// Secure key storage is unavailable, denied, or holds corrupt data.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// A salt was presented for a second key derivation.
    #[error("Salt reuse detected: {0}")]
    SaltReuse(String),

    /// Record storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted in the current state.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotInitialized("call initialize() first".to_string());
        assert_eq!(err.to_string(), "Not initialized: call initialize() first");

        let err = Error::Format("salt missing".to_string());
        assert_eq!(err.to_string(), "Format error: salt missing");
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
