//! API Routes
//!
//! Configures the Axum router: reserved endpoints first, interception for
//! everything else.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, intercept_handler, message_handler, status_handler, AppState,
};

/// Creates the main router.
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/__offline/message", post(message_handler))
        .route("/__offline/status", get(status_handler))
        .route("/__offline/health", get(health_handler))
        .fallback(intercept_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
