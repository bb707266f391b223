//! Deferred Cache
//!
//! Identity-keyed in-memory store with an explicit boundary to its durable copy.
//!
//! `store`, `fetch` and `delete` only touch memory and are cheap enough to call from any
//! context. `persist` and `load` go through the [`PersistenceAdapter`] and block for as long as
//! the storage medium takes, so run them where blocking is acceptable
//! (`tokio::task::spawn_blocking` from async code). With auto-persist enabled every mutation
//! that changes the mapping also persists, and inherits that blocking cost.
//!
//! A fresh cache has never been persisted or loaded and therefore reports unsaved changes
//! until the first successful `persist` or `load`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{OAuth2Error, StorageError, ValidationError};
use crate::token::PersistenceAdapter;

struct CacheState<T> {
    memory: HashMap<String, T>,
    last_persisted: Option<HashMap<String, T>>,
}

impl<T: PartialEq> CacheState<T> {
    fn has_unsaved(&self) -> bool {
        self.last_persisted.as_ref() != Some(&self.memory)
    }
}

/// In-memory identity -> value mapping with deferred persistence.
pub struct DeferredCache<T, A> {
    adapter: A,
    state: Mutex<CacheState<T>>,
    auto_persist: AtomicBool,
}

impl<T, A> DeferredCache<T, A>
where
    T: Clone + PartialEq + Send,
    A: PersistenceAdapter<T>,
{
    /// Create an empty cache.
    pub fn new(adapter: A) -> Self {
        Self::with_data(adapter, HashMap::new())
    }

    /// Create a cache seeded with `initial` in memory.
    pub fn with_data(adapter: A, initial: HashMap<String, T>) -> Self {
        Self {
            adapter,
            state: Mutex::new(CacheState {
                memory: initial,
                last_persisted: None,
            }),
            auto_persist: AtomicBool::new(false),
        }
    }

    /// Enable or disable auto-persist while building.
    pub fn with_auto_persist(self, enabled: bool) -> Self {
        self.set_auto_persist(enabled);
        self
    }

    /// Whether mutations persist immediately.
    pub fn auto_persist(&self) -> bool {
        self.auto_persist.load(Ordering::SeqCst)
    }

    /// Enable or disable auto-persist.
    pub fn set_auto_persist(&self, enabled: bool) {
        self.auto_persist.store(enabled, Ordering::SeqCst);
    }

    /// Get the persistence adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Insert or overwrite the value for `identity`.
    ///
    /// Blocks on persistence when auto-persist is enabled and the mapping changed.
    pub fn store(&self, identity: &str, value: T) -> Result<(), OAuth2Error> {
        if identity.trim().is_empty() {
            return Err(ValidationError::InvalidIdentity.into());
        }

        let mut state = self.lock();
        state.memory.insert(identity.to_string(), value);
        debug!(identity, "stored cache entry");

        if self.auto_persist() && state.has_unsaved() {
            self.persist_locked(&mut state)?;
        }
        Ok(())
    }

    /// Value held in memory for `identity`. Never touches durable storage.
    pub fn fetch(&self, identity: &str) -> Option<T> {
        self.lock().memory.get(identity).cloned()
    }

    /// Remove the value for `identity`. Absent identities are a no-op.
    pub fn delete(&self, identity: &str) -> Result<(), OAuth2Error> {
        let mut state = self.lock();
        if state.memory.remove(identity).is_none() {
            return Ok(());
        }
        debug!(identity, "deleted cache entry");

        if self.auto_persist() && state.has_unsaved() {
            self.persist_locked(&mut state)?;
        }
        Ok(())
    }

    /// Write the whole in-memory mapping to durable storage, replacing what was there.
    ///
    /// Blocking. On failure the unsaved marker stays set so the call can be repeated.
    pub fn persist(&self) -> Result<(), OAuth2Error> {
        let mut state = self.lock();
        self.persist_locked(&mut state)?;
        Ok(())
    }

    /// Replace the in-memory mapping with the durable one.
    ///
    /// Blocking. The cache lock is held across the durable read, so mutations wait for it.
    /// Entries that fail to decode are dropped with a warning. If the durable read itself
    /// fails, memory is left untouched.
    pub fn load(&self) -> Result<(), OAuth2Error> {
        let mut state = self.lock();
        let raw = self.adapter.read_all().map_err(into_load_failed)?;
        let mut loaded = HashMap::with_capacity(raw.len());

        for (identity, representation) in raw {
            if identity.trim().is_empty() {
                warn!("dropping persisted entry with empty identity");
                continue;
            }
            match self.adapter.deserialize(&representation) {
                Ok(value) => {
                    loaded.insert(identity, value);
                }
                Err(error) => warn!(identity = %identity, %error, "dropping corrupt persisted entry"),
            }
        }

        debug!(entries = loaded.len(), "loaded cache from durable storage");
        state.last_persisted = Some(loaded.clone());
        state.memory = loaded;
        Ok(())
    }

    /// Empty memory. The durable copy is untouched until the next `persist`.
    pub fn clear(&self) {
        self.lock().memory.clear();
    }

    /// Whether memory differs from the last persisted or loaded mapping.
    pub fn has_unsaved(&self) -> bool {
        self.lock().has_unsaved()
    }

    /// Diagnostic read of the in-memory value for `identity`.
    pub fn inspect(&self, identity: &str) -> Option<T> {
        self.fetch(identity)
    }

    /// Identities currently held in memory, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().memory.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Check if `identity` is held in memory.
    pub fn contains(&self, identity: &str) -> bool {
        self.lock().memory.contains_key(identity)
    }

    /// Number of entries held in memory.
    pub fn size(&self) -> usize {
        self.lock().memory.len()
    }

    /// Copy of the in-memory mapping.
    pub fn data(&self) -> HashMap<String, T> {
        self.lock().memory.clone()
    }

    fn persist_locked(&self, state: &mut CacheState<T>) -> Result<(), StorageError> {
        let entries = state
            .memory
            .iter()
            .map(|(identity, value)| {
                self.adapter
                    .serialize(value)
                    .map(|raw| (identity.clone(), raw))
            })
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(into_persist_failed)?;

        self.adapter
            .write_all(&entries)
            .map_err(into_persist_failed)?;

        debug!(entries = entries.len(), "persisted cache");
        state.last_persisted = Some(state.memory.clone());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn into_persist_failed(error: StorageError) -> StorageError {
    match error {
        StorageError::PersistFailed { .. } => error,
        other => StorageError::PersistFailed {
            message: other.to_string(),
        },
    }
}

fn into_load_failed(error: StorageError) -> StorageError {
    match error {
        StorageError::LoadFailed { .. } => error,
        other => StorageError::LoadFailed {
            message: other.to_string(),
        },
    }
}
