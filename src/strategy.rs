//! Fetch Strategy Set
//!
//! One strategy per request category, each fixing the order in which the
//! current cache and the network are consulted. Cache and network are never
//! raced; the declared order is authoritative.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheName, CacheStats, CacheStorage, CapturedResponse, RequestKey};
use crate::classify::RequestCategory;
use crate::error::Result;
use crate::events::WorkerNotification;
use crate::fallback::{offline_api_response, OfflineFallback};
use crate::network::Network;
use crate::request::InterceptedRequest;
use crate::tasks::spawn_cache_write;

const OFFLINE_API_MESSAGE: &str = "The network is unavailable; the request was not completed";

// == Response Source ==
/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
    Synthesized,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::OfflineFallback => "offline-fallback",
            ResponseSource::Synthesized => "synthesized",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response the layer claimed and answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedResponse {
    pub response: CapturedResponse,
    pub source: ResponseSource,
}

impl ServedResponse {
    fn new(response: CapturedResponse, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Result of offering a request to the layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Respond(ServedResponse),
    /// Declined; the harness sends the request to the network untouched
    PassThrough,
}

// == Strategy Context ==
/// Everything a strategy touches: the current cache, the network, and the
/// counters it reports to.
#[derive(Clone)]
pub struct StrategyContext {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub cache: CacheName,
    pub stats: Arc<RwLock<CacheStats>>,
    pub notifier: broadcast::Sender<WorkerNotification>,
}

impl StrategyContext {
    /// Looks up `key` in the current cache; storage errors count as misses.
    async fn lookup(&self, key: &RequestKey) -> Option<CacheEntry> {
        let found = match self.storage.get(&self.cache, key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup of {} in {} failed: {}", key, self.cache, e);
                None
            }
        };

        let mut stats = self.stats.write().await;
        if found.is_some() {
            stats.record_hit();
        } else {
            stats.record_miss();
        }
        found
    }

    async fn fetch(&self, request: &InterceptedRequest) -> Result<CapturedResponse> {
        let result = self.network.fetch(request).await;
        self.stats.write().await.record_fetch(result.is_err());
        result
    }

    /// Writes a successful response into the current cache. Returns false
    /// for responses that must not be cached and when the cache was deleted
    /// by an activation while the response was in flight.
    pub async fn put(&self, key: RequestKey, response: CapturedResponse) -> Result<bool> {
        if !response.is_cacheable() {
            debug!("Not caching {} ({})", key, response.status);
            return Ok(false);
        }
        let stored = self
            .storage
            .put_existing(&self.cache, key.clone(), CacheEntry::new(response))
            .await?;
        if !stored {
            debug!("Not caching {}: {} was superseded", key, self.cache);
            return Ok(false);
        }
        self.stats.write().await.record_store();
        Ok(true)
    }

    /// `put` whose failure is logged instead of returned.
    async fn store(&self, key: RequestKey, response: &CapturedResponse) {
        let label = key.clone();
        if let Err(e) = self.put(key, response.clone()).await {
            warn!("Failed to cache {} in {}: {}", label, self.cache, e);
        }
    }
}

// == Fetch Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Cache hit returns immediately; a miss is fetched and stored
    CacheFirst,
    /// Network with a background cache update; cache only if the network fails
    NetworkFirst,
    /// Network, then cache, then the offline page
    NetworkFirstWithOfflinePage,
    /// Network; failures become a synthesized "service unavailable" response
    NetworkOnly,
    PassThrough,
}

impl FetchStrategy {
    /// The strategy for a category. `fast_iteration` only affects static assets.
    pub fn for_category(category: RequestCategory, fast_iteration: bool) -> Self {
        match category {
            RequestCategory::StaticAsset if fast_iteration => FetchStrategy::NetworkFirst,
            RequestCategory::StaticAsset => FetchStrategy::CacheFirst,
            RequestCategory::Navigation => FetchStrategy::NetworkFirstWithOfflinePage,
            RequestCategory::ApiCall => FetchStrategy::NetworkOnly,
            RequestCategory::Uncategorized => FetchStrategy::PassThrough,
        }
    }

    pub async fn execute(
        self,
        ctx: &StrategyContext,
        request: &InterceptedRequest,
        fallback: &OfflineFallback,
    ) -> Result<FetchOutcome> {
        let served = match self {
            FetchStrategy::CacheFirst => cache_first(ctx, request).await?,
            FetchStrategy::NetworkFirst => network_first(ctx, request).await?,
            FetchStrategy::NetworkFirstWithOfflinePage => {
                network_first_with_offline_page(ctx, request, fallback).await?
            }
            FetchStrategy::NetworkOnly => network_only(ctx, request).await,
            FetchStrategy::PassThrough => {
                ctx.stats.write().await.record_pass_through();
                return Ok(FetchOutcome::PassThrough);
            }
        };
        debug!(
            "{} {} served from {} via {:?}",
            request.method,
            request.path_and_query(),
            served.source,
            self
        );
        Ok(FetchOutcome::Respond(served))
    }
}

async fn cache_first(ctx: &StrategyContext, request: &InterceptedRequest) -> Result<ServedResponse> {
    let key = RequestKey::for_request(request);
    if let Some(entry) = ctx.lookup(&key).await {
        return Ok(ServedResponse::new(entry.response, ResponseSource::Cache));
    }

    let response = ctx.fetch(request).await?;
    ctx.store(key, &response).await;
    Ok(ServedResponse::new(response, ResponseSource::Network))
}

async fn network_first(ctx: &StrategyContext, request: &InterceptedRequest) -> Result<ServedResponse> {
    let key = RequestKey::for_request(request);
    match ctx.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                spawn_cache_write(ctx.clone(), key, response.clone());
            }
            Ok(ServedResponse::new(response, ResponseSource::Network))
        }
        Err(err) => match ctx.lookup(&key).await {
            Some(entry) => Ok(ServedResponse::new(entry.response, ResponseSource::Cache)),
            None => Err(err),
        },
    }
}

async fn network_first_with_offline_page(
    ctx: &StrategyContext,
    request: &InterceptedRequest,
    fallback: &OfflineFallback,
) -> Result<ServedResponse> {
    let key = RequestKey::for_request(request);
    let err = match ctx.fetch(request).await {
        Ok(response) => {
            ctx.store(key, &response).await;
            return Ok(ServedResponse::new(response, ResponseSource::Network));
        }
        Err(err) => err,
    };

    if let Some(entry) = ctx.lookup(&key).await {
        return Ok(ServedResponse::new(entry.response, ResponseSource::Cache));
    }

    match fallback.response(ctx.storage.as_ref(), &ctx.cache).await {
        Some(page) => {
            ctx.stats.write().await.record_fallback();
            Ok(ServedResponse::new(page, ResponseSource::OfflineFallback))
        }
        None => {
            warn!(
                "No offline page in {}; navigation to {} fails",
                ctx.cache,
                request.path()
            );
            Err(err)
        }
    }
}

async fn network_only(ctx: &StrategyContext, request: &InterceptedRequest) -> ServedResponse {
    match ctx.fetch(request).await {
        Ok(response) => ServedResponse::new(response, ResponseSource::Network),
        Err(err) => {
            debug!("API call {} failed: {}", request.path_and_query(), err);
            ctx.stats.write().await.record_synthesized();
            ServedResponse::new(
                offline_api_response(OFFLINE_API_MESSAGE),
                ResponseSource::Synthesized,
            )
        }
    }
}
