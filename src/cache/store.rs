//! Memory Cache Store Module
//!
//! In-memory `CacheStorage` backend: a map of named caches behind an async
//! read/write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheName, CacheStorage, RequestKey};
use crate::error::Result;

type NamedCache = HashMap<RequestKey, CacheEntry>;

// == Memory Cache Storage ==
/// Volatile cache storage; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<CacheName, NamedCache>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &CacheName) -> Result<()> {
        let mut caches = self.caches.write().await;
        caches.entry(name.clone()).or_default();
        Ok(())
    }

    async fn get(&self, name: &CacheName, key: &RequestKey) -> Result<Option<CacheEntry>> {
        let caches = self.caches.read().await;
        Ok(caches.get(name).and_then(|cache| cache.get(key)).cloned())
    }

    async fn put(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<()> {
        let mut caches = self.caches.write().await;
        caches.entry(name.clone()).or_default().insert(key, entry);
        Ok(())
    }

    async fn put_existing(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<bool> {
        let mut caches = self.caches.write().await;
        match caches.get_mut(name) {
            Some(cache) => {
                cache.insert(key, entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, name: &CacheName) -> Result<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<CacheName>> {
        let mut names: Vec<CacheName> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn entries(&self, name: &CacheName) -> Result<Vec<RequestKey>> {
        let caches = self.caches.read().await;
        let mut keys: Vec<RequestKey> = caches
            .get(name)
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CapturedResponse;

    fn name(s: &str) -> CacheName {
        CacheName::parse(s).unwrap()
    }

    fn entry(body: &'static str) -> CacheEntry {
        CacheEntry::new(CapturedResponse::ok("text/plain", body))
    }

    #[tokio::test]
    async fn test_store_new_is_empty() {
        let store = MemoryCacheStorage::new();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_empty_cache() {
        let store = MemoryCacheStorage::new();
        store.open(&name("app-v1")).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec![name("app-v1")]);
        assert!(store.entries(&name("app-v1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryCacheStorage::new();
        let key = RequestKey::get("/static/app.js");

        store.put(&name("app-v1"), key.clone(), entry("js")).await.unwrap();
        let found = store.get(&name("app-v1"), &key).await.unwrap().unwrap();

        assert_eq!(&found.response.body[..], b"js");
    }

    #[tokio::test]
    async fn test_get_from_missing_cache_is_miss() {
        let store = MemoryCacheStorage::new();
        let found = store
            .get(&name("nope-v1"), &RequestKey::get("/"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let store = MemoryCacheStorage::new();
        let key = RequestKey::get("/");

        store.put(&name("app-v1"), key.clone(), entry("old")).await.unwrap();
        store.put(&name("app-v1"), key.clone(), entry("new")).await.unwrap();

        let found = store.get(&name("app-v1"), &key).await.unwrap().unwrap();
        assert_eq!(&found.response.body[..], b"new");
        assert_eq!(store.entries(&name("app-v1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_existing_never_recreates_cache() {
        let store = MemoryCacheStorage::new();
        let key = RequestKey::get("/static/app.css");
        store.open(&name("app-v1")).await.unwrap();

        assert!(store.put_existing(&name("app-v1"), key.clone(), entry("css")).await.unwrap());
        store.delete(&name("app-v1")).await.unwrap();
        assert!(!store.put_existing(&name("app-v1"), key, entry("css")).await.unwrap());

        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caches_are_isolated() {
        let store = MemoryCacheStorage::new();
        let key = RequestKey::get("/");

        store.put(&name("app-v1"), key.clone(), entry("v1")).await.unwrap();
        assert!(store.get(&name("app-v2"), &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let store = MemoryCacheStorage::new();
        store.open(&name("app-v1")).await.unwrap();

        assert!(store.delete(&name("app-v1")).await.unwrap());
        assert!(!store.delete(&name("app-v1")).await.unwrap());
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_sorted() {
        let store = MemoryCacheStorage::new();
        store.open(&name("app-v4")).await.unwrap();
        store.open(&name("app-v3")).await.unwrap();

        assert_eq!(
            store.keys().await.unwrap(),
            vec![name("app-v3"), name("app-v4")]
        );
    }
}
