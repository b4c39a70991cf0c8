use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::CredentialBackend;

/// File name of the credential file inside the cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

// ============================================================================
// OS keychain
// ============================================================================

/// Stores each key as a separate entry in the OS keychain
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl CredentialBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Stores all keys in a single JSON object on disk.
/// Writes go straight to disk so subsequent reads always see them.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend storing `credentials.json` under `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CREDENTIALS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_contents(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        Ok((!contents.trim().is_empty()).then_some(contents))
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match self.read_contents()? {
            Some(contents) => {
                serde_json::from_str(&contents).context("Failed to parse credentials file")
            }
            None => Ok(HashMap::new()),
        }
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        if values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents).context("Failed to write credentials file")?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // A corrupt file is replaced rather than blocking every write
        let mut values = match self.read_contents()? {
            Some(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt credentials file");
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        f(&mut values);
        self.write_all(&values)
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local storage; nothing survives a restart
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialStore;
    use std::sync::Arc;

    #[test]
    fn test_file_backend_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();

        let first = FileBackend::new(dir.path());
        first.set("access_token", "abc").unwrap();

        // A fresh instance stands in for a page reload
        let second = FileBackend::new(dir.path());
        assert_eq!(second.get("access_token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_backend_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested"));
        assert_eq!(backend.get("access_token").unwrap(), None);
        backend.remove("access_token").unwrap();
    }

    #[test]
    fn test_file_backend_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.set("a", "1").unwrap();
        backend.set("b", "2").unwrap();
        assert!(backend.path().exists());

        backend.remove("a").unwrap();
        assert!(backend.path().exists());
        assert_eq!(backend.get("b").unwrap().as_deref(), Some("2"));

        backend.remove("b").unwrap();
        assert!(!backend.path().exists());
    }

    #[test]
    fn test_file_backend_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "not json").unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.get("access_token").is_err());
    }

    #[test]
    fn test_file_backend_remove_discards_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), r#"{"access_token": "abc""#).unwrap();
        let store = CredentialStore::new(Arc::new(FileBackend::new(dir.path())));

        store.clear().unwrap();
        assert!(!dir.path().join(CREDENTIALS_FILE).exists());
        assert_eq!(store.load_access().unwrap(), None);
    }

    #[test]
    fn test_file_backend_set_overwrites_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), r#"{"access_token": "abc""#).unwrap();
        let store = CredentialStore::new(Arc::new(FileBackend::new(dir.path())));

        store.save("access-2", "refresh-2").unwrap();
        assert_eq!(store.load_access().unwrap().as_deref(), Some("access-2"));
        assert_eq!(store.load_refresh().unwrap().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("k").unwrap(), None);
        backend.set("k", "v").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v"));
        backend.remove("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }
}
