//! Encryption and secure backup engine for DiaryVault.
//!
//! This module provides:
//! - Master key lifecycle backed by a secure store
//! - Selective encryption of private journal records
//! - Password or device-key protected backup archives
//! - The `DiaryCrypto` facade the application talks to
//!
//! # Architecture
//! One `KeyManager` is created per installation and shared by handle with
//! the encryption policy and the backup codec. Nothing here holds a global
//! key; tearing down the manager tears down access to all private data.

pub mod backup;
pub mod config;
pub mod key_manager;
pub mod models;
pub mod policy;
pub mod service;

pub use backup::{ArchiveMode, BackupArchive, BackupCodec};
pub use config::{ArchiveFormat, SubsystemConfig};
pub use key_manager::{KeyManager, KeyState};
pub use models::{
    Attachment, AttachmentKind, BackupDataset, ChatMessage, ChatPlatform, ChatRecord,
    DatasetSummary, DateRange, FontSize, JournalEntry, MessageType, Mood, Tag, Theme,
    UserPreferences,
};
pub use policy::{PrivateRecord, RecordContent, SelectiveEncryptionPolicy};
pub use service::DiaryCrypto;
