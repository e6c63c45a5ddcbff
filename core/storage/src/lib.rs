//! Storage collaborators for DiaryVault.
//!
//! This module provides the trait-based interfaces through which the
//! encryption subsystem reaches the outside world (a protected key store
//! and the journal record store), with in-memory and local filesystem
//! implementations.
//!
//! # Design Principles
//! - Store isolation: no store-specific logic in vault or crypto modules
//! - Synchronous calls: every operation is a small, bounded read or write
//! - Unified error semantics: key store failures are `KeyStore`, record
//!   store failures are `Storage` or `NotFound`

pub mod local;
pub mod memory;
pub mod provider;

pub use local::{LocalRecordStore, LocalSecureStore};
pub use memory::{MemoryRecordStore, MemorySecureStore};
pub use provider::{RawRecord, RecordStore, SecureStore};
