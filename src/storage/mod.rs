//! Durable key-value storage
//!
//! The records engine persists each ledger as one JSON value under a flat
//! string key. Writes are whole-value overwrites; the last writer wins.
//!
//! Provides:
//! - `KeyValueStore` trait implemented by every backend
//! - `MemoryStore` for tests and throwaway sessions
//! - `SqliteStore` for sessions that must survive a restart

pub mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

pub use sqlite::SqliteStore;

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored value for key '{key}' is unreadable: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A flat, string-keyed persistent store
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key` if present
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store backed by a `HashMap`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Read and decode a JSON value.
///
/// A value that fails to decode is reported as absent so callers fall back to
/// their defaults instead of refusing to start.
pub fn read_json<T, S>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Stored value for '{}' is unreadable ({}), ignoring it", key, e);
            Ok(None)
        }
    }
}

/// Encode a value as JSON and overwrite `key` with it
pub fn write_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &json)
}
