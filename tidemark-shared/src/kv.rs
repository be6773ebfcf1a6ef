//! Generic Key-Value store traits for pluggable storage backends.
//!
//! Collectors persist their watermarks through this abstraction, so the same polling code runs
//! against the local file store in production and the in-memory store in tests.
//!
//! `async_trait` keeps the trait object safe, stores are shared as `Arc<dyn KVStore>`.

use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error as StdError;

/// File-backed implementation, one file per key.
pub mod file;

/// Error type for KV operations (boxed for object safety)
pub type KVError = Box<dyn StdError + Send + Sync + 'static>;

/// KVStore defines a generic key-value store interface.
///
/// Implementations must make `put` atomic with respect to a concurrent `get` of the same key and
/// must not serialize operations on distinct keys behind a shared lock.
#[async_trait]
pub trait KVStore: Send + Sync {
    /// Get all keys from the KV store.
    async fn keys(&self) -> Result<Vec<String>, KVError>;

    /// Delete a key from the KV store. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Insert or update a key-value pair.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), KVError>;

    /// Get the value for a given key.
    ///
    /// # Returns
    /// * `Ok(Some(value))` - If the key exists
    /// * `Ok(None)` - If the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KVError>;

    /// Get the store name/identifier.
    fn name(&self) -> &str;
}
