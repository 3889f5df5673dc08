//! Cache Name Module
//!
//! Versioned identifiers for named caches, e.g. `app-cache-v4`.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, WorkerError};

// == Cache Name ==
/// Identifier of one named cache. The trailing `-`-separated segment is the
/// version token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheName(String);

impl CacheName {
    /// Builds `{prefix}-{version}`.
    pub fn versioned(prefix: &str, version: &str) -> Result<Self> {
        Self::parse(format!("{}-{}", prefix, version))
    }

    /// Validates an existing cache name.
    ///
    /// Names must be non-empty and restricted to `[A-Za-z0-9._-]` so every
    /// backend can use them verbatim (the disk store maps them to directories).
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if name.is_empty() || !valid_chars || name == "." || name == ".." {
            return Err(WorkerError::InvalidCacheName(name));
        }
        Ok(Self(name))
    }

    /// Returns the version token (the segment after the last `-`), if any.
    pub fn version(&self) -> Option<&str> {
        self.0
            .rsplit_once('-')
            .map(|(_, version)| version)
            .filter(|version| !version.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_name() {
        let name = CacheName::versioned("app-cache", "v4").unwrap();
        assert_eq!(name.as_str(), "app-cache-v4");
        assert_eq!(name.version(), Some("v4"));
    }

    #[test]
    fn test_name_without_version() {
        let name = CacheName::parse("scratch").unwrap();
        assert_eq!(name.version(), None);
    }

    #[test]
    fn test_rejects_unsafe_names() {
        assert!(CacheName::parse("").is_err());
        assert!(CacheName::parse("..").is_err());
        assert!(CacheName::parse("a/b").is_err());
        assert!(CacheName::parse("app cache").is_err());
        assert!(CacheName::versioned("app", "v1/../x").is_err());
    }
}
