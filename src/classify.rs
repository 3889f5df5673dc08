//! Request Classifier
//!
//! Maps an intercepted request to the category that selects its fetch
//! strategy. Pure and synchronous.

use std::fmt;

use axum::http::Method;
use serde::Serialize;

use crate::config::Config;
use crate::request::InterceptedRequest;

// == Request Category ==
/// Category of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    StaticAsset,
    Navigation,
    ApiCall,
    /// Not intercepted; passed straight through
    Uncategorized,
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestCategory::StaticAsset => "static_asset",
            RequestCategory::Navigation => "navigation",
            RequestCategory::ApiCall => "api_call",
            RequestCategory::Uncategorized => "uncategorized",
        };
        f.write_str(name)
    }
}

// == Classifier ==
/// Classification rules: static roots and extensions, API prefixes.
#[derive(Debug, Clone)]
pub struct Classifier {
    static_prefixes: Vec<String>,
    /// Lowercase, without the leading dot
    static_extensions: Vec<String>,
    api_prefixes: Vec<String>,
}

impl Classifier {
    pub fn new(
        static_prefixes: Vec<String>,
        static_extensions: Vec<String>,
        api_prefixes: Vec<String>,
    ) -> Self {
        Self {
            static_prefixes,
            static_extensions: static_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            api_prefixes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.static_prefixes.clone(),
            config.static_extensions.clone(),
            config.api_prefixes.clone(),
        )
    }

    /// Classifies a request. Rules apply in priority order:
    ///
    /// 1. non-`GET` methods are never intercepted
    /// 2. static root or static extension
    /// 3. top-level navigation
    /// 4. API prefix
    pub fn classify(&self, request: &InterceptedRequest) -> RequestCategory {
        if request.method != Method::GET {
            return RequestCategory::Uncategorized;
        }

        let path = request.path();
        if self.is_static_path(path) {
            RequestCategory::StaticAsset
        } else if request.is_navigation() {
            RequestCategory::Navigation
        } else if self.api_prefixes.iter().any(|prefix| path.starts_with(prefix)) {
            RequestCategory::ApiCall
        } else {
            RequestCategory::Uncategorized
        }
    }

    fn is_static_path(&self, path: &str) -> bool {
        if self
            .static_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            return true;
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.static_extensions.iter().any(|known| *known == ext)
            }
            _ => false,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
