//! Response DTOs for the offline proxy
//!
//! Defines the structure of JSON bodies the layer produces itself.

use serde::Serialize;

use crate::cache::{CacheName, CacheStats};
use crate::lifecycle::LifecycleSnapshot;

/// Body of the synthesized response for an API call that could not reach
/// the network.
#[derive(Debug, Clone, Serialize)]
pub struct OfflineApiBody {
    /// Machine-readable error code, always "service_unavailable"
    pub error: &'static str,
    /// Always true; lets the page branch on offline state
    pub offline: bool,
    /// Human-readable description
    pub message: String,
}

impl OfflineApiBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: "service_unavailable",
            offline: true,
            message: message.into(),
        }
    }
}

/// Response body for the status endpoint (GET /__offline/status)
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Cache name of the active instance
    pub current_cache: Option<CacheName>,
    pub fast_iteration: bool,
    pub lifecycle: LifecycleSnapshot,
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatusResponse {
    pub fn new(lifecycle: LifecycleSnapshot, stats: CacheStats, fast_iteration: bool) -> Self {
        Self {
            current_cache: lifecycle
                .active
                .as_ref()
                .map(|instance| instance.cache_name.clone()),
            fast_iteration,
            hit_rate: stats.hit_rate(),
            lifecycle,
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /__offline/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
