//! Three-tier key-value persistence for the session record
//!
//! Reads fall through fast → durable → memory. Writes land in the fast tier
//! and are read back; the durable tier is only written when that read-back
//! cannot confirm the value. The in-memory tier is always updated so a
//! broken environment still keeps the session for the life of the process.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// JSON object on disk, one entry per key
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ResilientStorage {
    fast: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
    memory: MemoryStore,
}

impl ResilientStorage {
    pub fn new(fast: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            fast,
            durable,
            memory: MemoryStore::new(),
        }
    }

    /// All three tiers in memory; used by tests and headless tools
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.fast.get(key) {
            Ok(Some(value)) if !value.is_empty() => return Some(value),
            Ok(_) => {}
            Err(e) => debug!(key, error = %e, "fast tier read failed"),
        }
        match self.durable.get(key) {
            Ok(Some(value)) if !value.is_empty() => return Some(value),
            Ok(_) => {}
            Err(e) => debug!(key, error = %e, "durable tier read failed"),
        }
        self.memory.get(key).ok().flatten()
    }

    pub fn set(&self, key: &str, value: &str) {
        let confirmed = match self.fast.set(key, value) {
            Ok(()) => matches!(self.fast.get(key), Ok(Some(ref stored)) if stored == value),
            Err(e) => {
                debug!(key, error = %e, "fast tier write failed");
                false
            }
        };

        if !confirmed {
            if let Err(e) = self.durable.set(key, value) {
                warn!(key, error = %e, "durable tier write failed, keeping value in memory only");
            }
        }

        // Cannot fail short of a poisoned lock, and the value is then lost anyway
        let _ = self.memory.set(key, value);
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.fast.remove(key) {
            debug!(key, error = %e, "fast tier remove failed");
        }
        if let Err(e) = self.durable.remove(key) {
            debug!(key, error = %e, "durable tier remove failed");
        }
        let _ = self.memory.remove(key);
    }
}
