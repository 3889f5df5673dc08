//! API Handlers
//!
//! The interception handler every proxied request goes through, plus the
//! reserved `/__offline/*` endpoints.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::events::{EventOutcome, WorkerEvent};
use crate::models::{HealthResponse, StatusResponse};
use crate::request::InterceptedRequest;
use crate::strategy::FetchOutcome;
use crate::worker::OfflineWorker;

/// Response header naming where a response came from.
pub const SOURCE_HEADER: &str = "x-offline-source";

/// Source value for responses forwarded without interception.
pub const PASS_THROUGH_SOURCE: &str = "pass-through";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<OfflineWorker>,
    /// Largest request body the interception handler buffers
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(worker: Arc<OfflineWorker>, max_body_bytes: usize) -> Self {
        Self {
            worker,
            max_body_bytes,
        }
    }

    pub fn from_config(worker: Arc<OfflineWorker>, config: &Config) -> Self {
        Self::new(worker, config.max_body_bytes)
    }
}

/// Fallback handler: offers the request to the worker and writes back
/// whatever it decides.
pub async fn intercept_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Rejecting {} {}: {}", parts.method, parts.uri, e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let request = InterceptedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };

    let outcome = match state
        .worker
        .dispatch(WorkerEvent::Fetch(request.clone()))
        .await
    {
        EventOutcome::Fetch(outcome) => outcome,
        other => {
            warn!("Unexpected fetch outcome: {:?}", other);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match outcome {
        Ok(FetchOutcome::Respond(served)) => {
            tagged(served.response.into_response(), served.source.as_str())
        }
        Ok(FetchOutcome::PassThrough) => match state.worker.forward(&request).await {
            Ok(response) => tagged(response.into_response(), PASS_THROUGH_SOURCE),
            Err(e) => {
                warn!("Pass-through of {} {} failed: {}", request.method, request.uri, e);
                e.into_response()
            }
        },
        Err(e) => {
            warn!("Serving {} {} failed: {}", request.method, request.uri, e);
            e.into_response()
        }
    }
}

fn tagged(mut response: Response, source: &'static str) -> Response {
    response
        .headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source));
    response
}

/// Handler for POST /__offline/message
///
/// Always answers 204 so a foreign sender cannot tell whether it was heard.
pub async fn message_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> StatusCode {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    let outcome = state.worker.handle_message(origin, &payload).await;
    debug!("Control message outcome: {:?}", outcome);
    StatusCode::NO_CONTENT
}

/// Handler for GET /__offline/status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let worker = &state.worker;
    Json(StatusResponse::new(
        worker.snapshot().await,
        worker.stats().await,
        worker.settings().fast_iteration,
    ))
}

/// Handler for GET /__offline/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use crate::cache::MemoryCacheStorage;
    use crate::testing::FakeNetwork;
    use crate::worker::WorkerSettings;

    const MANIFEST: [&str; 4] = ["/", "/static/css/main.css", "/static/js/app.js", "/offline.html"];

    fn state(network: Arc<FakeNetwork>, max_body_bytes: usize) -> AppState {
        let worker = OfflineWorker::new(
            WorkerSettings::default(),
            Arc::new(MemoryCacheStorage::new()),
            network,
        );
        AppState::new(Arc::new(worker), max_body_bytes)
    }

    fn empty_request(method: &str, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn source(response: &Response) -> &str {
        response.headers()[SOURCE_HEADER].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_intercept_before_install_passes_through() {
        let network = Arc::new(FakeNetwork::serving(&MANIFEST));
        let state = state(network.clone(), 1024);

        let response = intercept_handler(State(state), empty_request("GET", "/static/js/app.js")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(source(&response), PASS_THROUGH_SOURCE);
        assert_eq!(network.calls_to("/static/js/app.js"), 1);
    }

    #[tokio::test]
    async fn test_intercept_serves_from_cache() {
        let network = Arc::new(FakeNetwork::serving(&MANIFEST));
        let state = state(network.clone(), 1024);
        state.worker.install().await.unwrap();
        network.set_online(false);

        let response = intercept_handler(State(state), empty_request("GET", "/static/css/main.css")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(source(&response), "cache");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"/static/css/main.css body");
    }

    #[tokio::test]
    async fn test_intercept_body_too_large() {
        let state = state(Arc::new(FakeNetwork::default()), 4);
        let request = Request::builder()
            .method("POST")
            .uri("/api/expenses")
            .body(Body::from("way too long"))
            .unwrap();

        let response = intercept_handler(State(state), request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_pass_through_network_failure_is_bad_gateway() {
        let network = Arc::new(FakeNetwork::default());
        network.set_online(false);
        let state = state(network, 1024);

        let response = intercept_handler(State(state), empty_request("DELETE", "/api/expenses/1")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_message_handler_always_no_content() {
        let state = state(Arc::new(FakeNetwork::default()), 1024);
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://elsewhere.example"));

        let status = message_handler(
            State(state.clone()),
            headers,
            Bytes::from_static(br#"{"type":"PROMOTE_NOW"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = message_handler(State(state), HeaderMap::new(), Bytes::from_static(b"junk")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_status_handler() {
        let state = state(Arc::new(FakeNetwork::serving(&MANIFEST)), 1024);
        state.worker.install().await.unwrap();

        let response = status_handler(State(state)).await;
        assert_eq!(
            response.current_cache.as_ref().map(|c| c.as_str()),
            Some("app-cache-v1")
        );
        assert!(response.lifecycle.waiting.is_none());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
