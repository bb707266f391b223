//! Token Storage
//!
//! Persistence adapters and the raw storage media behind the deferred cache.
//!
//! Everything here is blocking. A [`StorageBackend`] only ever sees whole snapshots:
//! `write_all` replaces the durable contents, it never merges into them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::error::StorageError;
use crate::types::{StoredToken, Token};

/// Capability a deferred cache needs from its durable layer.
pub trait PersistenceAdapter<T>: Send + Sync {
    /// Encode one value. Must be the inverse of [`deserialize`](Self::deserialize).
    fn serialize(&self, value: &T) -> Result<String, StorageError>;

    /// Decode one stored representation.
    fn deserialize(&self, raw: &str) -> Result<T, StorageError>;

    /// Read every stored identity and its raw representation.
    fn read_all(&self) -> Result<HashMap<String, String>, StorageError>;

    /// Replace the durable contents with exactly `entries`.
    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError>;
}

/// Raw key-value medium holding serialized entries.
pub trait StorageBackend: Send + Sync {
    /// Read the full snapshot.
    fn read_all(&self) -> Result<HashMap<String, String>, StorageError>;

    /// Replace the full snapshot.
    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        (**self).read_all()
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        (**self).write_all(entries)
    }
}

/// Token adapter storing each token as its JSON record.
pub struct JsonTokenAdapter<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> JsonTokenAdapter<B> {
    /// Create adapter over a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: StorageBackend> PersistenceAdapter<Token> for JsonTokenAdapter<B> {
    fn serialize(&self, value: &Token) -> Result<String, StorageError> {
        serde_json::to_string(&StoredToken::from(value)).map_err(|e| StorageError::PersistFailed {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, raw: &str) -> Result<Token, StorageError> {
        serde_json::from_str::<StoredToken>(raw)
            .map(StoredToken::into_token)
            .map_err(|e| StorageError::Corrupt {
                message: e.to_string(),
            })
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        self.backend.read_all()
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        self.backend.write_all(entries)
    }
}

/// In-process backend. Holds the last written snapshot and counts writes.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    write_count: Mutex<usize>,
    should_fail: Mutex<bool>,
}

impl MemoryBackend {
    /// Create empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend with pre-existing raw entries.
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Copy of the current durable snapshot.
    pub fn snapshot(&self) -> HashMap<String, String> {
        lock(&self.entries).clone()
    }

    /// Put a raw entry directly into the durable snapshot.
    pub fn insert_raw(&self, identity: impl Into<String>, raw: impl Into<String>) -> &Self {
        lock(&self.entries).insert(identity.into(), raw.into());
        self
    }

    /// Number of successful `write_all` calls.
    pub fn write_count(&self) -> usize {
        *lock(&self.write_count)
    }

    /// Make every read and write fail.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *lock(&self.should_fail) = should_fail;
        self
    }
}

impl StorageBackend for MemoryBackend {
    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        if *lock(&self.should_fail) {
            return Err(StorageError::LoadFailed {
                message: "Memory backend failure".to_string(),
            });
        }
        Ok(self.snapshot())
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if *lock(&self.should_fail) {
            return Err(StorageError::PersistFailed {
                message: "Memory backend failure".to_string(),
            });
        }
        *lock(&self.entries) = entries.clone();
        *lock(&self.write_count) += 1;
        Ok(())
    }
}

/// Backend persisting a flat JSON object of `identity -> raw entry` to one file.
///
/// Non-string values in the file are ignored on read, with a warning naming the identity. Writes go to a sibling temporary file
/// which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create backend for the given file path. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileBackend {
    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| StorageError::LoadFailed {
            message: format!("{}: {}", self.path.display(), e),
        })?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&contents)
            .map_err(|e| StorageError::LoadFailed {
                message: format!("{}: {}", self.path.display(), e),
            })?;

        Ok(object
            .into_iter()
            .filter_map(|(identity, value)| match value {
                serde_json::Value::String(raw) => Some((identity, raw)),
                _ => {
                    warn!(
                        identity = %identity,
                        path = %self.path.display(),
                        "ignoring non-string entry in token file"
                    );
                    None
                }
            })
            .collect())
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let persist_failed = |e: std::io::Error| StorageError::PersistFailed {
            message: format!("{}: {}", self.path.display(), e),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persist_failed)?;
        }

        let ordered: BTreeMap<&String, &String> = entries.iter().collect();
        let contents =
            serde_json::to_string_pretty(&ordered).map_err(|e| StorageError::PersistFailed {
                message: e.to_string(),
            })?;

        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(persist_failed)?;
        fs::rename(&temp, &self.path).map_err(persist_failed)
    }
}

/// Token adapter over a JSON file.
pub fn create_file_token_adapter(path: impl Into<PathBuf>) -> JsonTokenAdapter<FileBackend> {
    JsonTokenAdapter::new(FileBackend::new(path))
}

/// Token adapter over an in-process backend.
pub fn create_memory_token_adapter() -> JsonTokenAdapter<MemoryBackend> {
    JsonTokenAdapter::new(MemoryBackend::new())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
