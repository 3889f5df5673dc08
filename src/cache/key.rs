//! Request Key Module
//!
//! Normalized request identity used to key cache entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::InterceptedRequest;

// == Request Key ==
/// Method plus origin-relative URL, query included: `GET /static/app.js?v=2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    /// Builds the key for an intercepted request.
    pub fn for_request(request: &InterceptedRequest) -> Self {
        Self::new(request.method.as_str(), request.path_and_query())
    }

    /// Builds the key for a `GET` of `path`.
    pub fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    fn new(method: &str, path_and_query: &str) -> Self {
        let path = if path_and_query.is_empty() {
            "/"
        } else {
            path_and_query
        };
        Self(format!("{} {}", method.to_ascii_uppercase(), path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_query() {
        let request = InterceptedRequest::get("/static/app.js?v=2");
        assert_eq!(
            RequestKey::for_request(&request).as_str(),
            "GET /static/app.js?v=2"
        );
    }

    #[test]
    fn test_navigation_and_fetch_share_identity() {
        let nav = InterceptedRequest::navigate("/offline.html");
        assert_eq!(RequestKey::for_request(&nav), RequestKey::get("/offline.html"));
    }

    #[test]
    fn test_distinct_queries_are_distinct_keys() {
        assert_ne!(RequestKey::get("/a?x=1"), RequestKey::get("/a?x=2"));
    }
}
