//! Client-local credential storage for the helpdesk client.
//!
//! This crate provides:
//! - **`CredentialStorage`**: the key/value backend trait
//! - **`FileStorage`**: durable JSON-file backend (one file per profile)
//! - **`MemoryStorage`**: in-process backend for tests and ephemeral runs
//! - **`CredentialStore`**: typed access to the access/refresh credentials
//!   and the signed-in user profile

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::{CredentialStore, UserProfile, UserRole};
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::CredentialStorage;

use helpdesk_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure (poisoned lock, corrupt file, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default durable storage at `~/.helpdesk/credentials.json`
/// (or under the configured base directory).
pub fn create_file_storage(paths: &Paths) -> StorageResult<Box<dyn CredentialStorage>> {
    paths
        .ensure_dirs()
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let storage = FileStorage::open(paths.credentials_file())?;
    Ok(Box::new(storage))
}

/// Create a CredentialStore backed by the default durable storage.
pub fn create_credential_store(paths: &Paths) -> StorageResult<CredentialStore> {
    let storage = create_file_storage(paths)?;
    Ok(CredentialStore::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_credential_store_persists_under_base_dir() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("profile"));

        let store = create_credential_store(&paths).unwrap();
        store.set_session("access-1", "refresh-1").unwrap();

        assert!(paths.credentials_file().exists());

        let reopened = create_credential_store(&paths).unwrap();
        assert_eq!(reopened.access_token().unwrap(), Some("access-1".to_string()));
        assert_eq!(reopened.refresh_token().unwrap(), Some("refresh-1".to_string()));
    }

    #[test]
    fn test_storage_keys_match_backend_contract() {
        assert_eq!(StorageKeys::ACCESS, "access");
        assert_eq!(StorageKeys::REFRESH, "refresh");
        assert_eq!(StorageKeys::USER, "user");
    }
}
