//! Cryptographic primitives for DiaryVault.
//!
//! This module provides:
//! - SHA-256 hashing and HMAC-SHA256 authentication
//! - Password-based key derivation using PBKDF2-HMAC-SHA256
//! - AES-256-CBC encryption with self-describing envelopes
//! - Encrypt-then-MAC envelopes for blobs whose integrity must be provable
//! - Key types with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons
//!
//! Everything here is stateless and safe to call from any thread.

pub mod authenticated;
pub mod cipher;
pub mod integrity;
pub mod kdf;
pub mod keys;

pub use authenticated::{open, seal, AuthenticatedEnvelope};
pub use cipher::{
    decrypt, decrypt_object, decrypt_string, encrypt, encrypt_object, encrypt_string,
    CipherEnvelope, BLOCK_SIZE, IV_SIZE,
};
pub use integrity::{hash, hmac, verify_hash, verify_hmac, DIGEST_SIZE};
pub use kdf::{derive, derive_key, KdfParams};
pub use keys::{DerivedKey, MasterKey, Salt, KEY_LENGTH, SALT_SIZE};
