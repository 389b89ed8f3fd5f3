//! File-based storage backend with atomic writes.
//!
//! Stores one file per key under `dirs::data_dir()/<namespace>/`.
//! Uses temp file + rename for atomic writes.

use crate::storage::Storage;
use crate::GuardError;
use std::fs;
use std::path::PathBuf;

/// File-based storage backend.
pub struct FileStorage {
    /// Directory holding one file per key.
    dir: PathBuf,
}

impl FileStorage {
    /// Create file storage with the given namespace.
    ///
    /// Files are stored under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, GuardError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| GuardError::StorageIO("Could not find data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create file storage rooted at a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, GuardError> {
        fs::create_dir_all(&dir)
            .map_err(|e| GuardError::StorageIO(format!("Failed to create storage dir: {}", e)))?;
        Ok(Self { dir })
    }

    /// Path for a key, rejecting names that could escape the directory.
    fn key_path(&self, key: &str) -> Result<PathBuf, GuardError> {
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !safe {
            return Err(GuardError::StorageIO(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GuardError> {
        let path = self.key_path(key)?;

        if !path.exists() {
            return Ok(None);
        }

        let value = fs::read_to_string(&path)
            .map_err(|e| GuardError::StorageIO(format!("Failed to read {}: {}", key, e)))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GuardError> {
        let target_path = self.key_path(key)?;
        let temp_path = self.dir.join(format!("{}.tmp", key));

        fs::write(&temp_path, value)
            .map_err(|e| GuardError::StorageIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &target_path)
            .map_err(|e| GuardError::StorageIO(format!("Failed to rename {}: {}", key, e)))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GuardError> {
        let path = self.key_path(key)?;

        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| GuardError::StorageIO(format!("Failed to delete {}: {}", key, e)))?;
        }

        Ok(())
    }
}
