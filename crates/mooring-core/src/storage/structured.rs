//! Directory-backed structured store.
//!
//! The richest durable tier: each key gets its own `<key>.json` file under
//! a dedicated directory, so large collections do not force rewriting
//! unrelated entries.

use std::fs;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StorageError};

/// One JSON file per key under a dedicated directory.
pub struct StructuredStore {
    dir: PathBuf,
}

impl StructuredStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keep keys filesystem-safe; anything outside [A-Za-z0-9_-] becomes '_'.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl KeyValueStore for StructuredStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let file_path = self.file_path(key);
        let temp_path = temp_path_for(&file_path);

        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.file_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
