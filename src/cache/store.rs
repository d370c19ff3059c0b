//! Storage backends for cached reply payloads.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;

use super::CacheKey;

/// Errors raised by a [`Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A persistent key/value store for reply payloads.
///
/// Implementations must tolerate concurrent `get`/`put` from several tasks.
/// No ordering between a racing `put` and `get` on the same key is required.
///
/// Both methods may block on I/O. The executor calls them through
/// [`tokio::task::spawn_blocking`], never directly on a runtime worker.
pub trait Store: Send + Sync {
    /// Returns the payload stored under `key`, or `None` on a miss.
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key`, replacing any previous payload.
    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError>;
}

/// Process-local store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(*key, Bytes::copy_from_slice(value));
        Ok(())
    }
}
