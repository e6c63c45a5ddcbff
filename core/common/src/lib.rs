//! Common utilities and types shared across DiaryVault modules.
//!
//! This module provides the error type every other crate reports through,
//! plus a few validated identifier types.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ItemName, RecordId};
