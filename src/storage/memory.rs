//! In-memory storage backend.

use crate::storage::Storage;
use crate::GuardError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local storage; contents vanish with the instance.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GuardError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| GuardError::StorageIO("Memory storage lock poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GuardError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| GuardError::StorageIO("Memory storage lock poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GuardError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| GuardError::StorageIO("Memory storage lock poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}
