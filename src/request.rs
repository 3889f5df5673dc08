//! Intercepted Request Module
//!
//! The request shape the layer classifies and serves, independent of how the
//! hosting harness delivered it.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};

/// Fetch-metadata header carrying the request mode (`navigate`, `cors`, ...).
pub const SEC_FETCH_MODE: &str = "sec-fetch-mode";

/// Fetch-metadata header carrying the request destination (`document`, `script`, ...).
pub const SEC_FETCH_DEST: &str = "sec-fetch-dest";

// == Intercepted Request ==
/// A request issued by the host page and offered to the layer.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    /// Origin-relative URI (path and query)
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InterceptedRequest {
    /// Creates a request with the given method and URI, no headers and no body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Convenience constructor for a `GET` sub-resource fetch.
    ///
    /// Panics if `path` is not a valid URI; intended for fixed paths such as
    /// manifest entries that were validated up front.
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path.parse().expect("valid request path"))
    }

    /// Convenience constructor for a top-level document load.
    pub fn navigate(path: &str) -> Self {
        Self::get(path).with_header(SEC_FETCH_MODE, "navigate")
    }

    /// Adds a header, replacing any previous value. Invalid values are skipped.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query string, as sent to the origin.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Whether this request is a top-level document load.
    ///
    /// Fetch metadata wins when present; clients that omit it are treated as
    /// navigations when they ask for HTML.
    pub fn is_navigation(&self) -> bool {
        if let Some(mode) = header_str(&self.headers, SEC_FETCH_MODE) {
            return mode.eq_ignore_ascii_case("navigate");
        }
        if let Some(dest) = header_str(&self.headers, SEC_FETCH_DEST) {
            return dest.eq_ignore_ascii_case("document");
        }
        header_str(&self.headers, header::ACCEPT.as_str())
            .map(|accept| accept.contains("text/html"))
            .unwrap_or(false)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_mode_is_navigation() {
        assert!(InterceptedRequest::navigate("/dashboard").is_navigation());
    }

    #[test]
    fn test_plain_get_is_not_navigation() {
        assert!(!InterceptedRequest::get("/dashboard").is_navigation());
    }

    #[test]
    fn test_fetch_metadata_overrides_accept() {
        let request = InterceptedRequest::get("/dashboard")
            .with_header(SEC_FETCH_MODE, "cors")
            .with_header("accept", "text/html");
        assert!(!request.is_navigation());
    }

    #[test]
    fn test_document_destination_is_navigation() {
        let request = InterceptedRequest::get("/").with_header(SEC_FETCH_DEST, "document");
        assert!(request.is_navigation());
    }

    #[test]
    fn test_accept_html_without_metadata() {
        let request = InterceptedRequest::get("/reports")
            .with_header("accept", "text/html,application/xhtml+xml");
        assert!(request.is_navigation());
    }

    #[test]
    fn test_path_and_query() {
        let request = InterceptedRequest::get("/api/expenses?page=2");
        assert_eq!(request.path(), "/api/expenses");
        assert_eq!(request.path_and_query(), "/api/expenses?page=2");
    }
}
