//! Background Cache Writes
//!
//! Fire-and-forget stores for network-first static assets: the response is
//! returned to the caller while the copy is written to the cache.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CapturedResponse, RequestKey};
use crate::events::WorkerNotification;
use crate::strategy::StrategyContext;

/// Spawns a task that stores `response` under `key` in the context's cache.
///
/// Failures never reach the response path. They are logged at `warn` and
/// published as `BackgroundRefreshFailed`.
///
/// # Returns
/// A JoinHandle for the spawned task; callers normally drop it.
pub fn spawn_cache_write(
    ctx: StrategyContext,
    key: RequestKey,
    response: CapturedResponse,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match ctx.put(key.clone(), response).await {
            Ok(true) => debug!("Background refresh stored {} in {}", key, ctx.cache),
            Ok(false) => {}
            Err(e) => {
                warn!("Background refresh of {} failed: {}", key, e);
                let _ = ctx.notifier.send(WorkerNotification::BackgroundRefreshFailed {
                    key,
                    reason: e.to_string(),
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::{broadcast, RwLock};

    use crate::cache::{CacheEntry, CacheName, CacheStats, CacheStorage, MemoryCacheStorage};
    use crate::error::{Result, WorkerError};
    use crate::testing::FakeNetwork;

    /// Storage whose writes always fail.
    struct ReadOnlyStorage(MemoryCacheStorage);

    #[async_trait]
    impl CacheStorage for ReadOnlyStorage {
        async fn open(&self, name: &CacheName) -> Result<()> {
            self.0.open(name).await
        }
        async fn get(&self, name: &CacheName, key: &RequestKey) -> Result<Option<CacheEntry>> {
            self.0.get(name, key).await
        }
        async fn put(&self, _name: &CacheName, _key: RequestKey, _entry: CacheEntry) -> Result<()> {
            Err(WorkerError::Storage("read-only".to_string()))
        }
        async fn put_existing(&self, _name: &CacheName, _key: RequestKey, _entry: CacheEntry) -> Result<bool> {
            Err(WorkerError::Storage("read-only".to_string()))
        }
        async fn delete(&self, name: &CacheName) -> Result<bool> {
            self.0.delete(name).await
        }
        async fn keys(&self) -> Result<Vec<CacheName>> {
            self.0.keys().await
        }
        async fn entries(&self, name: &CacheName) -> Result<Vec<RequestKey>> {
            self.0.entries(name).await
        }
    }

    fn context(storage: Arc<dyn CacheStorage>) -> (StrategyContext, broadcast::Receiver<WorkerNotification>) {
        let (notifier, rx) = broadcast::channel(8);
        let ctx = StrategyContext {
            storage,
            network: Arc::new(FakeNetwork::default()),
            cache: CacheName::parse("app-v1").unwrap(),
            stats: Arc::new(RwLock::new(CacheStats::new())),
            notifier,
        };
        (ctx, rx)
    }

    #[tokio::test]
    async fn test_background_write_stores_entry() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let (ctx, _rx) = context(storage.clone());
        let key = RequestKey::get("/static/app.js");
        storage.open(&ctx.cache).await.unwrap();

        spawn_cache_write(ctx.clone(), key.clone(), CapturedResponse::ok("text/javascript", "x"))
            .await
            .unwrap();

        assert!(storage.get(&ctx.cache, &key).await.unwrap().is_some());
        assert_eq!(ctx.stats.read().await.stores, 1);
    }

    #[tokio::test]
    async fn test_background_failure_is_published() {
        let (ctx, mut rx) = context(Arc::new(ReadOnlyStorage(MemoryCacheStorage::new())));
        let key = RequestKey::get("/static/app.js");

        spawn_cache_write(ctx, key.clone(), CapturedResponse::ok("text/javascript", "x"))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            WorkerNotification::BackgroundRefreshFailed { key: failed, reason } => {
                assert_eq!(failed, key);
                assert!(reason.contains("read-only"));
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }
}
