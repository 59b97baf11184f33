//! Single-file key-value store.
//!
//! The plain durable tier: every key lives in one flat JSON map file,
//! rewritten wholesale on each write. Cheap for small values (tokens,
//! preferences, health mirrors), simpler to inspect than the structured
//! tier, and the closest native analogue of a flat string-to-string store.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// Flat JSON map persisted to a single file.
pub struct SimpleStore {
    path: PathBuf,
    // Guards the read-modify-write cycle within this process.
    write_lock: Mutex<()>,
}

impl SimpleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp_path = PathBuf::from(temp);

        let json = serde_json::to_string_pretty(map)?;
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}

impl KeyValueStore for SimpleStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut map = self.load_map()?;
        if map.remove(key).is_some() {
            self.save_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = SimpleStore::new(dir.path().join("store.json"));

        store.set("token", "abc").unwrap();

        assert_eq!(store.get("token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn multiple_keys_coexist() {
        let dir = tempdir().unwrap();
        let store = SimpleStore::new(dir.path().join("store.json"));

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn remove_only_touches_its_key() {
        let dir = tempdir().unwrap();
        let store = SimpleStore::new(dir.path().join("store.json"));

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a").unwrap();

        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = SimpleStore::new(dir.path().join("never-written.json"));

        assert!(store.get("anything").unwrap().is_none());
        store.remove("anything").unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let store = SimpleStore::new(&path);
        assert!(matches!(store.get("key"), Err(StorageError::Json(_))));
    }
}
