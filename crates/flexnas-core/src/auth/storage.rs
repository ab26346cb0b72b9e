//! Persisted client storage for the session.
//!
//! The session keeps three string entries (token, display username and role)
//! under fixed keys. Where they live is up to the backend:
//! - `FileStorage`: `session.json` in the cache directory (default)
//! - `KeyringStorage`: one OS keychain entry per key
//! - `MemoryStorage`: process-local, used by tests

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::StorageError;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name for the keyring backend
const SERVICE_NAME: &str = "flexnas-console";

/// Fixed keys for the persisted session entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    Token,
    User,
    Role,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [StorageKey::Token, StorageKey::User, StorageKey::Role];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::User => "user",
            StorageKey::Role => "role",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key-value storage backing a `SessionStore`.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError>;

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError>;

    /// Removing a key that is not present is not an error.
    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;

    /// Remove every session entry. Attempts all keys and reports the first failure.
    fn clear(&self) -> Result<(), StorageError> {
        let mut first_err = None;
        for key in StorageKey::ALL {
            if let Err(e) = self.remove(key) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// File backend
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Stores the session entries as JSON in `<dir>/session.json`.
pub struct FileStorage {
    dir: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// When the session file was last written, if it exists
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.read_file()?.and_then(|f| f.updated_at))
    }

    fn read_file(&self) -> Result<Option<SessionFile>, StorageError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let file = serde_json::from_str(&contents)?;
        Ok(Some(file))
    }

    fn write_file(&self, file: &SessionFile) -> Result<(), StorageError> {
        let path = self.path();
        if file.entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
                debug!(path = %path.display(), "Removed empty session file");
            }
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(file)?;
        std::fs::write(&path, contents).map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.read_file()?.unwrap_or_default();
        f(&mut file.entries);
        file.updated_at = Some(Utc::now());
        self.write_file(&file)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self
            .read_file()?
            .and_then(|mut f| f.entries.remove(key.as_str())))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        if !self.path().exists() {
            return Ok(());
        }
        self.modify(|entries| {
            entries.remove(key.as_str());
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
        }
        Ok(())
    }
}

// ============================================================================
// Keyring backend
// ============================================================================

/// Stores each session entry in the OS keychain.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: StorageKey) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key.as_str()).map_err(|source| StorageError::Keyring { key, source })
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for KeyringStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(source) => Err(StorageError::Keyring { key, source }),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|source| StorageError::Keyring { key, source })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(source) => Err(StorageError::Keyring { key, source }),
        }
    }
}

// ============================================================================
// Memory backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::SessionStore;

    #[test]
    fn test_storage_key_names() {
        assert_eq!(StorageKey::Token.as_str(), "token");
        assert_eq!(StorageKey::User.as_str(), "user");
        assert_eq!(StorageKey::Role.as_str(), "role");
    }

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(StorageKey::Token).unwrap(), None);

        storage.set(StorageKey::Token, "tok1").unwrap();
        assert_eq!(storage.get(StorageKey::Token).unwrap().as_deref(), Some("tok1"));

        storage.remove(StorageKey::Token).unwrap();
        assert_eq!(storage.get(StorageKey::Token).unwrap(), None);
        // Removing again is fine
        storage.remove(StorageKey::Token).unwrap();
    }

    #[test]
    fn test_memory_storage_clear() {
        let storage = MemoryStorage::new();
        storage.set(StorageKey::Token, "tok1").unwrap();
        storage.set(StorageKey::User, "alice").unwrap();
        storage.set(StorageKey::Role, "admin").unwrap();

        storage.clear().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get(StorageKey::Token).unwrap(), None);
        assert_eq!(storage.last_updated().unwrap(), None);
        storage.remove(StorageKey::Role).unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("flexnas-console");

        let storage = FileStorage::new(&nested);
        storage.set(StorageKey::Token, "tok1").unwrap();
        storage.set(StorageKey::User, "alice").unwrap();
        assert!(storage.path().exists());
        assert!(storage.last_updated().unwrap().is_some());

        let reopened = FileStorage::new(&nested);
        assert_eq!(reopened.get(StorageKey::Token).unwrap().as_deref(), Some("tok1"));
        assert_eq!(reopened.get(StorageKey::User).unwrap().as_deref(), Some("alice"));
        assert_eq!(reopened.get(StorageKey::Role).unwrap(), None);
    }

    #[test]
    fn test_file_storage_removing_last_entry_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set(StorageKey::Token, "tok1").unwrap();
        storage.remove(StorageKey::Token).unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set(StorageKey::Token, "tok1").unwrap();
        storage.set(StorageKey::Role, "admin").unwrap();

        storage.clear().unwrap();
        assert!(!storage.path().exists());
        assert_eq!(storage.get(StorageKey::Token).unwrap(), None);
    }

    #[test]
    fn test_file_storage_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        std::fs::write(storage.path(), "not json").unwrap();
        assert!(matches!(
            storage.get(StorageKey::Token),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_keyring_storage_round_trip() {
        let service = format!("flexnas-console-test-{}", std::process::id());
        let storage = Arc::new(KeyringStorage::with_service(&service));

        // Hosts without a reachable keychain (e.g. keyctl blocked in containers) reject the write
        if let Err(e) = storage.set(StorageKey::Token, "tok1") {
            eprintln!("skipping keyring round trip: {}", e);
            return;
        }
        storage.set(StorageKey::User, "alice").unwrap();

        let reopened = KeyringStorage::with_service(&service);
        assert_eq!(reopened.get(StorageKey::Token).unwrap().as_deref(), Some("tok1"));

        let session = SessionStore::initialize(storage.clone(), "/");
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("tok1"));
        assert_eq!(session.username().as_deref(), Some("alice"));

        session.logout();
        assert_eq!(reopened.get(StorageKey::Token).unwrap(), None);
        assert_eq!(reopened.get(StorageKey::User).unwrap(), None);
    }
}
