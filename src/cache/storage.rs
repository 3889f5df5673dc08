//! Cache Storage Trait
//!
//! The interface every named-cache backend implements. The layer only talks
//! to storage through this trait, so tests can swap in the memory backend.

use async_trait::async_trait;

use super::{CacheEntry, CacheName, RequestKey};
use crate::error::Result;

/// A set of named caches, each mapping request identities to stored responses.
///
/// Each operation is atomic per key: concurrent puts to the same key leave
/// exactly one of the written entries in place.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the named cache if it does not exist yet.
    async fn open(&self, name: &CacheName) -> Result<()>;

    /// Looks up an entry. A missing cache is reported as a miss.
    async fn get(&self, name: &CacheName, key: &RequestKey) -> Result<Option<CacheEntry>>;

    /// Stores an entry, replacing any previous entry for the key.
    /// The cache is created if it does not exist.
    async fn put(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<()>;

    /// Stores an entry only if the cache still exists. Returns false, without
    /// writing, when the cache is missing, e.g. deleted by an activation
    /// while the response was in flight.
    async fn put_existing(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<bool>;

    /// Deletes a whole cache. Returns true if it existed.
    async fn delete(&self, name: &CacheName) -> Result<bool>;

    /// Enumerates all cache names, sorted.
    async fn keys(&self) -> Result<Vec<CacheName>>;

    /// Enumerates the request keys stored in one cache, sorted.
    async fn entries(&self, name: &CacheName) -> Result<Vec<RequestKey>>;
}
