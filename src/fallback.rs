//! Offline Fallback Provider
//!
//! Last-resort responses: the precached offline page for navigations and a
//! synthesized "service unavailable" payload for API calls.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use tracing::warn;

use crate::cache::{CacheName, CacheStorage, CapturedResponse, RequestKey};
use crate::models::OfflineApiBody;

/// Status returned for API calls that could not reach the network.
pub const OFFLINE_API_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

// == Offline Fallback ==
/// Designated cache entry served when a navigation exhausted network and cache.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
    key: RequestKey,
}

impl OfflineFallback {
    /// Uses the entry stored for `GET {path}`.
    pub fn new(path: &str) -> Self {
        Self {
            key: RequestKey::get(path),
        }
    }

    /// Looks up the offline page in `cache`. Never fails: a missing entry or a
    /// storage error yields `None`.
    pub async fn response(
        &self,
        storage: &dyn CacheStorage,
        cache: &CacheName,
    ) -> Option<CapturedResponse> {
        match storage.get(cache, &self.key).await {
            Ok(entry) => entry.map(|entry| entry.response),
            Err(e) => {
                warn!("Offline page lookup in {} failed: {}", cache, e);
                None
            }
        }
    }
}

/// Builds the structured response returned for an API call the network could
/// not serve.
pub fn offline_api_response(reason: &str) -> CapturedResponse {
    let body = OfflineApiBody::new(reason);
    let encoded = serde_json::to_vec(&body).unwrap_or_else(|_| {
        br#"{"error":"service_unavailable","offline":true}"#.to_vec()
    });

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    CapturedResponse::new(OFFLINE_API_STATUS, headers, encoded)
}
