//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::path::PathBuf;

use url::Url;

const DEFAULT_MANIFEST: [&str; 4] = ["/", "/static/css/main.css", "/static/js/app.js", "/offline.html"];

const DEFAULT_STATIC_EXTENSIONS: [&str; 14] = [
    "css", "js", "mjs", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf",
    "map",
];

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Upstream origin the layer fetches from
    pub origin_url: String,
    /// The layer's own origin; control messages must come from here
    pub public_origin: String,
    /// Cache-name prefix
    pub cache_prefix: String,
    /// Version token of the cache this process installs
    pub cache_version: String,
    /// Directory for the durable store; memory storage when unset
    pub cache_dir: Option<PathBuf>,
    /// Paths populated into the cache at install time
    pub precache_manifest: Vec<String>,
    /// Path of the offline fallback page (must be in the manifest)
    pub offline_page: String,
    pub static_prefixes: Vec<String>,
    pub static_extensions: Vec<String>,
    pub api_prefixes: Vec<String>,
    /// Network-first for static assets
    pub fast_iteration: bool,
    /// Largest request body buffered by the interception handler
    pub max_body_bytes: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - Listen port (default: 3000)
    /// - `ORIGIN_URL` - Upstream origin (default: http://127.0.0.1:8000)
    /// - `PUBLIC_ORIGIN` - The layer's own origin (default: http://localhost:3000)
    /// - `CACHE_PREFIX` / `CACHE_VERSION` - Cache name parts (default: app-cache / v1)
    /// - `CACHE_DIR` - Durable store directory (default: memory storage)
    /// - `PRECACHE_MANIFEST` - Comma-separated paths
    /// - `OFFLINE_PAGE` - Offline fallback path (default: /offline.html)
    /// - `STATIC_PREFIXES`, `STATIC_EXTENSIONS`, `API_PREFIXES` - Comma-separated rules
    /// - `FAST_ITERATION` - true/false (default: true when PUBLIC_ORIGIN is loopback)
    /// - `MAX_BODY_BYTES` - Request body limit (default: 10 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let public_origin = env::var("PUBLIC_ORIGIN").unwrap_or(defaults.public_origin);
        let fast_iteration = env::var("FAST_ITERATION")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or_else(|| is_loopback_origin(&public_origin));

        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
            public_origin,
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            precache_manifest: list_var("PRECACHE_MANIFEST").unwrap_or(defaults.precache_manifest),
            offline_page: env::var("OFFLINE_PAGE").unwrap_or(defaults.offline_page),
            static_prefixes: list_var("STATIC_PREFIXES").unwrap_or(defaults.static_prefixes),
            static_extensions: list_var("STATIC_EXTENSIONS").unwrap_or(defaults.static_extensions),
            api_prefixes: list_var("API_PREFIXES").unwrap_or(defaults.api_prefixes),
            fast_iteration,
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            origin_url: "http://127.0.0.1:8000".to_string(),
            public_origin: "http://localhost:3000".to_string(),
            cache_prefix: "app-cache".to_string(),
            cache_version: "v1".to_string(),
            cache_dir: None,
            precache_manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            offline_page: "/offline.html".to_string(),
            static_prefixes: vec!["/static/".to_string()],
            static_extensions: DEFAULT_STATIC_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            api_prefixes: vec!["/api/".to_string()],
            fast_iteration: false,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// True when the origin's host is a loopback address.
pub fn is_loopback_origin(origin: &str) -> bool {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_ascii_lowercase()))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
        .unwrap_or(false)
}

fn list_var(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
