//! Cache Entry Module
//!
//! Captured responses and the immutable cache entries that hold them.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

/// Headers that describe a single hop and must not be stored or replayed.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

// == Captured Response ==
/// A fully buffered response: status, headers and body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedResponse {
    /// Creates a response, dropping hop-by-hop headers.
    pub fn new(status: StatusCode, mut headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        strip_hop_by_hop(&mut headers);
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A `200 OK` response with the given content type.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        Self::new(StatusCode::OK, headers, body)
    }

    /// Only successful responses may be written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for CapturedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Removes hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
}

// == Cache Entry ==
/// A stored response plus the time it was stored.
///
/// Entries are never mutated after creation; a newer put replaces the entry
/// wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub response: CapturedResponse,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Captures `response` with the current time.
    pub fn new(response: CapturedResponse) -> Self {
        Self {
            response,
            stored_at: Utc::now(),
        }
    }

    /// Age of the entry in whole seconds.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.stored_at).num_seconds().max(0)
    }
}
