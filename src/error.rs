//! Error types for the offline proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

// == Worker Error Enum ==
/// Unified error type for the interception layer.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The network fetch failed before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// A cache store operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A manifest entry could not be fetched or stored
    #[error("Install of '{cache}' failed: {reason}")]
    InstallFailed { cache: String, reason: String },

    /// The precache manifest is malformed
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Cache name contains characters outside `[A-Za-z0-9._-]`
    #[error("Invalid cache name: {0}")]
    InvalidCacheName(String),

    /// Lifecycle operation attempted from the wrong state
    #[error("Invalid lifecycle state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// Configuration value could not be used
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkerError {
    /// Shorthand for an `InvalidState` error built from the observed state.
    pub fn invalid_state(expected: &'static str, actual: Option<LifecycleState>) -> Self {
        WorkerError::InvalidState {
            expected,
            actual: actual
                .map(|state| state.to_string())
                .unwrap_or_else(|| "no instance".to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::Network(_) => StatusCode::BAD_GATEWAY,
            WorkerError::InvalidManifest(_) | WorkerError::InvalidCacheName(_) => {
                StatusCode::BAD_REQUEST
            }
            WorkerError::InvalidState { .. } => StatusCode::CONFLICT,
            WorkerError::Storage(_)
            | WorkerError::InstallFailed { .. }
            | WorkerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline proxy.
pub type Result<T> = std::result::Result<T, WorkerError>;
