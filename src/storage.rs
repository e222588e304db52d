use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::utils::error::{GuardError, Result};

/// Minimal persistent key-value store abstraction.
///
/// Every security component persists through this trait so a browser store,
/// file, embedded database, or OS-secure-storage backend can be substituted
/// without touching the algorithms above it. The trait is synchronous on
/// purpose: gate checks must complete their read-modify-write without a
/// suspension point.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, overwriting any prior value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the entry under `key`; succeeds if absent
    fn remove(&self, key: &str) -> Result<()>;

    /// Delete every entry
    fn clear(&self) -> Result<()>;

    /// List the keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory store backend (not persistent)
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        entries.clear();
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store: a single JSON object image written through on every
/// mutation. Suitable for a desktop client profile directory.
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open or create the store at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| GuardError::storage(format!("corrupt store image: {}", e)))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        entries.clear();
        self.persist(&entries)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| GuardError::storage("store lock poisoned"))?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Per-key mutexes guarding read-modify-write sequences on the store.
///
/// Each counter update must be atomic for its key; scoping the lock to the
/// key keeps unrelated keys from serializing behind each other.
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or create) the mutex for `key`
    pub(crate) fn lock_for(&self, key: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| GuardError::storage("lock table poisoned"))?;
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

/// Create a key-value store for the configured backend
pub fn create_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryKeyValueStore::new())),
        StorageBackend::File => {
            debug!("opening file store at {}", config.file_path.display());
            Ok(Arc::new(FileKeyValueStore::new(&config.file_path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryKeyValueStore::new();

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("2".to_string()));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        // Removing an absent key succeeds
        store.remove("a").unwrap();
    }

    #[test]
    fn test_memory_store_prefix_listing() {
        let store = MemoryKeyValueStore::new();
        store.set("rate.login", "[]").unwrap();
        store.set("rate.search", "[]").unwrap();
        store.set("token", "x").unwrap();

        let mut keys = store.keys_with_prefix("rate.").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["rate.login", "rate.search"]);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileKeyValueStore::new(&path).unwrap();
            store.set("k", "v").unwrap();
        }

        let store = FileKeyValueStore::new(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));

        store.clear().unwrap();
        let store = FileKeyValueStore::new(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_create_store_backends() {
        let memory = create_store(&StorageConfig::default()).unwrap();
        memory.set("k", "v").unwrap();
        assert_eq!(memory.get("k").unwrap(), Some("v".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            file_path: dir.path().join("store.json"),
        };
        let file = create_store(&config).unwrap();
        file.set("k", "v").unwrap();
        assert_eq!(file.get("k").unwrap(), Some("v".to_string()));
    }
}
