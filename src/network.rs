//! Network Module
//!
//! The fetch primitive strategies fall through to. `HttpNetwork` talks to the
//! configured origin with reqwest.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use tracing::debug;

use crate::cache::{strip_hop_by_hop, CapturedResponse};
use crate::error::{Result, WorkerError};
use crate::request::InterceptedRequest;

/// Fetches a request from the network.
///
/// An `Err` means no response arrived (connection refused, DNS failure,
/// reset). HTTP error statuses are returned as `Ok` responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CapturedResponse>;
}

// == HTTP Network ==
/// Reverse-proxy fetcher bound to one origin.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: String,
}

impl HttpNetwork {
    /// Creates a fetcher for `origin` (e.g. `http://127.0.0.1:8000`).
    pub fn new(origin: &str) -> Result<Self> {
        let parsed = url::Url::parse(origin)
            .map_err(|e| WorkerError::Config(format!("ORIGIN_URL '{}': {}", origin, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WorkerError::Config(format!(
                "ORIGIN_URL '{}' must use http or https",
                origin
            )));
        }

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WorkerError::Config(e.to_string()))?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    fn target_url(&self, request: &InterceptedRequest) -> String {
        format!("{}{}", self.origin, request.path_and_query())
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CapturedResponse> {
        let url = self.target_url(request);
        debug!("Fetching {} {}", request.method, url);

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| WorkerError::Network(format!("{}: {}", url, e)))?;

        let status = response.status();
        let headers: HeaderMap = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Network(format!("{}: {}", url, e)))?;

        Ok(CapturedResponse::new(status, headers, body))
    }
}
