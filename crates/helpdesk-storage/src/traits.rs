//! Storage trait definitions.

use crate::StorageResult;

/// Trait for credential storage backends.
///
/// Absence of a key is a valid state (logged out), reported as `Ok(None)`.
pub trait CredentialStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete several keys. The default deletes one by one; backends that
    /// persist to disk override it to write once.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }
}
