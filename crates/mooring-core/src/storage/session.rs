//! In-process transient store.
//!
//! The last real tier before placeholder synthesis: survives for the life
//! of the process only, so it catches data from this session even when
//! both file-backed tiers are unusable.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// Process-scoped in-memory key-value store.
#[derive(Default)]
pub struct SessionStore {
    map: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.map.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.map.lock().map_err(|_| StorageError::Poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.map.lock().map_err(|_| StorageError::Poisoned)?;
        map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_cycle() {
        let store = SessionStore::new();

        assert!(store.get("key").unwrap().is_none());

        store.set("key", "value").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("value"));

        store.remove("key").unwrap();
        assert!(store.get("key").unwrap().is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = SessionStore::new();

        store.set("key", "first").unwrap();
        store.set("key", "second").unwrap();

        assert_eq!(store.get("key").unwrap().as_deref(), Some("second"));
    }
}
