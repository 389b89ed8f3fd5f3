//! String-keyed persistent storage and the stored record format.

pub mod envelope;
pub mod file;
pub mod memory;

use crate::GuardError;

/// Local key-value storage holding the subscription record.
///
/// Writes across two keys are not transactional; readers must tolerate a
/// half-written pair.
pub trait Storage: Send + Sync {
    /// Read a value, `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, GuardError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), GuardError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), GuardError>;
}
