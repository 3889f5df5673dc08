//! Precache Manifest
//!
//! The fixed, ordered list of paths populated into a new cache at install.

use axum::http::{Method, Uri};

use crate::error::{Result, WorkerError};
use crate::request::InterceptedRequest;

// == Manifest ==
/// Validated list of root-relative paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    entries: Vec<Uri>,
}

impl Manifest {
    /// Validates and builds a manifest.
    ///
    /// Every entry must be a root-relative path that parses as a URI; entries
    /// must be unique.
    pub fn new<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<Uri> = Vec::new();
        for path in paths {
            let path = path.as_ref().trim();
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(WorkerError::InvalidManifest(format!(
                    "'{}' is not a root-relative path",
                    path
                )));
            }
            let uri: Uri = path
                .parse()
                .map_err(|e| WorkerError::InvalidManifest(format!("'{}': {}", path, e)))?;
            if entries.contains(&uri) {
                return Err(WorkerError::InvalidManifest(format!(
                    "'{}' is listed twice",
                    path
                )));
            }
            entries.push(uri);
        }

        if entries.is_empty() {
            return Err(WorkerError::InvalidManifest(
                "manifest has no entries".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Fails unless `path` is one of the entries.
    pub fn require(&self, path: &str) -> Result<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(WorkerError::InvalidManifest(format!(
                "'{}' must be precached",
                path
            )))
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|uri| uri == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|uri| {
            uri.path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| uri.path())
        })
    }

    /// One `GET` request per entry, in manifest order.
    pub fn requests(&self) -> Vec<InterceptedRequest> {
        self.entries
            .iter()
            .map(|uri| InterceptedRequest::new(Method::GET, uri.clone()))
            .collect()
    }
}
