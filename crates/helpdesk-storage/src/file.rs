//! Durable JSON-file storage backend.
//!
//! The whole store is one JSON object. Every read goes to disk so that
//! several client processes sharing a profile observe each other's
//! writes; every write replaces the file atomically (temp file + rename).

use crate::{CredentialStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Entries = BTreeMap<String, String>;

/// File-backed credential storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (without creating) the store at `path`. A missing file reads
    /// as an empty store; a corrupt one is reported on first access.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StorageResult<Entries> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Encoding(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_entries(&self, entries: &Entries) -> StorageResult<()> {
        let content = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            restrict_permissions(&file)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Entries) -> T) -> StorageResult<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Backend("file storage lock poisoned".to_string()))?;
        let mut entries = self.read_entries()?;
        let result = f(&mut entries);
        self.write_entries(&entries)?;
        Ok(result)
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.modify(|entries| entries.remove(key).is_some())
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.modify(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}
