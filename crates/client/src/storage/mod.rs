//! Key-value storage port.
//!
//! The session and the cart persist themselves through [`KeyValueStore`], the
//! same shape as browser local storage: string keys, string values, last
//! write wins. Two implementations ship with the crate:
//!
//! - [`MemoryStore`] - process memory only (tests, throwaway sessions)
//! - [`FileStore`] - a single JSON document on disk (the CLI)

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A previous writer panicked while holding the store lock.
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StorageError>;

/// Persistent string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Load and decode a JSON value.
///
/// # Errors
///
/// Returns `StorageError` if the backend fails or the value is not valid
/// JSON for `T`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    store
        .get(key)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(StorageError::from)
}

/// Encode and store a JSON value.
///
/// # Errors
///
/// Returns `StorageError` if encoding or the backend fails.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        save_json(&store, "numbers", &[1, 2, 3]).unwrap();
        let loaded: Option<Vec<i32>> = load_json(&store, "numbers").unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = load_json(&store, "absent").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_load_json_rejects_garbage() {
        let store = MemoryStore::new();
        store.set("cart:1", "{not json").unwrap();
        let result: StoreResult<Option<Vec<i32>>> = load_json(&store, "cart:1");
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }
}
