//! Storage tier adapters.
//!
//! # Overview
//!
//! The tiered stores read and write through one capability interface,
//! `KeyValueStore`, with a concrete adapter per backing tier:
//!
//! - [`StructuredStore`] - one JSON file per key, atomic writes
//! - [`SimpleStore`] - a single flat JSON map file
//! - [`SessionStore`] - in-process memory, gone when the process exits
//!
//! # Design Principles
//!
//! Adapters report failures honestly via `StorageError`; the decision that
//! a failed tier degrades to the next one belongs to the orchestrators
//! (token store, tiered project store), not here.
//!
//! All file-backed writes use write-then-rename to prevent corruption:
//!
//! 1. Write to `file.json.tmp`
//! 2. Rename to `file.json` (atomic on Unix)

pub mod session;
pub mod simple;
pub mod structured;

pub use session::SessionStore;
pub use simple::SimpleStore;
pub use structured::StructuredStore;

use thiserror::Error;

/// Error type for storage tier operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Common capability interface over the backing tiers.
///
/// Values are opaque strings; callers serialize their own payloads so the
/// same adapter can hold project collections, tokens, and preferences.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
