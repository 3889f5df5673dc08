//! Disk Cache Store Module
//!
//! Durable `CacheStorage` backend. Layout under the root directory:
//!
//! ```text
//! <root>/<cache-name>/<sha256(key)>.json          entry metadata (commit point)
//! <root>/<cache-name>/<sha256(key)>.<id>.body     body bytes referenced by the metadata
//! ```
//!
//! A put writes a fresh body file, then atomically renames new metadata over
//! the old one. Readers therefore see either the old entry or the new one.
//! Writes to the same key are serialized in-process, so the body a rename
//! displaces is always removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, CacheName, CacheStorage, CapturedResponse, RequestKey};
use crate::error::{Result, WorkerError};

const META_EXT: &str = "json";

/// Lock stripes guarding writes, selected by the first digest nibble.
const WRITE_STRIPES: usize = 16;

static NEXT_WRITE_ID: AtomicU64 = AtomicU64::new(0);

/// On-disk metadata for one entry.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
    body_file: String,
}

// == Disk Cache Storage ==
/// Cache storage rooted at a directory; survives restarts.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
    write_locks: Arc<[Mutex<()>; WRITE_STRIPES]>,
}

impl DiskCacheStorage {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &CacheName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn meta_path(&self, name: &CacheName, key: &RequestKey) -> PathBuf {
        self.cache_dir(name)
            .join(format!("{}.{}", key_digest(key), META_EXT))
    }

    async fn read_meta(&self, path: &Path) -> Result<Option<EntryMeta>> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| WorkerError::Storage(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn write_lock(&self, digest: &str) -> &Mutex<()> {
        let stripe = digest
            .get(..1)
            .and_then(|nibble| usize::from_str_radix(nibble, 16).ok())
            .unwrap_or(0);
        &self.write_locks[stripe % WRITE_STRIPES]
    }

    /// Writes one entry into an existing cache directory. Returns false when
    /// the directory is gone; nothing is left behind in that case.
    async fn write_entry(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<bool> {
        let dir = self.cache_dir(name);
        let digest = key_digest(&key);
        let _guard = self.write_lock(&digest).lock().await;

        let write_id = format!(
            "{}-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            NEXT_WRITE_ID.fetch_add(1, Ordering::Relaxed)
        );

        let body_file = format!("{}.{}.body", digest, write_id);
        let body_path = dir.join(&body_file);
        match fs::write(&body_path, &entry.response.body).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(&body_path, e)),
        }

        let meta_path = self.meta_path(name, &key);
        let previous = self.read_meta(&meta_path).await.ok().flatten();

        let headers = entry
            .response
            .headers
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str().to_string(), value.to_string())),
                Err(_) => {
                    debug!("Skipping non-text header {} for {}", name, key);
                    None
                }
            })
            .collect();

        let meta = EntryMeta {
            key,
            status: entry.response.status.as_u16(),
            headers,
            stored_at: entry.stored_at,
            body_file,
        };
        let encoded =
            serde_json::to_vec(&meta).map_err(|e| WorkerError::Storage(e.to_string()))?;

        let tmp_path = dir.join(format!("{}.{}.tmp", digest, write_id));
        let committed = match fs::write(&tmp_path, encoded).await {
            Ok(()) => fs::rename(&tmp_path, &meta_path).await,
            Err(e) => Err(e),
        };
        match committed {
            Ok(()) => {}
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                let _ = fs::remove_file(&body_path).await;
                if e.kind() == ErrorKind::NotFound {
                    return Ok(false);
                }
                return Err(io_error(&meta_path, e));
            }
        }

        if let Some(previous) = previous {
            if previous.body_file != meta.body_file {
                let _ = fs::remove_file(dir.join(previous.body_file)).await;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &CacheName) -> Result<()> {
        let dir = self.cache_dir(name);
        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))
    }

    async fn get(&self, name: &CacheName, key: &RequestKey) -> Result<Option<CacheEntry>> {
        let Some(meta) = self.read_meta(&self.meta_path(name, key)).await? else {
            return Ok(None);
        };

        let body_path = self.cache_dir(name).join(&meta.body_file);
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            // Replaced or deleted between the two reads
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&body_path, e)),
        };

        let status = StatusCode::from_u16(meta.status)
            .map_err(|e| WorkerError::Storage(format!("{}: {}", meta.key, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &meta.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        Ok(Some(CacheEntry {
            response: CapturedResponse::new(status, headers, body),
            stored_at: meta.stored_at,
        }))
    }

    async fn put(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<()> {
        let dir = self.cache_dir(name);
        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;
        if !self.write_entry(name, key, entry).await? {
            debug!("Cache {} was deleted during a put", name);
        }
        Ok(())
    }

    async fn put_existing(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<bool> {
        self.write_entry(name, key, entry).await
    }

    async fn delete(&self, name: &CacheName) -> Result<bool> {
        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&dir, e)),
        }
    }

    async fn keys(&self) -> Result<Vec<CacheName>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(|e| io_error(&self.root, e))? {
            let is_dir = item
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = item
                .file_name()
                .to_str()
                .and_then(|s| CacheName::parse(s).ok())
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn entries(&self, name: &CacheName) -> Result<Vec<RequestKey>> {
        let cache_dir = self.cache_dir(name);
        let mut dir = match fs::read_dir(&cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&cache_dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(|e| io_error(&cache_dir, e))? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXT) {
                continue;
            }
            if let Some(meta) = self.read_meta(&path).await? {
                keys.push(meta.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn key_digest(key: &RequestKey) -> String {
    hex::encode(Sha256::digest(key.as_str().as_bytes()))
}

fn io_error(path: &Path, err: std::io::Error) -> WorkerError {
    WorkerError::Storage(format!("{}: {}", path.display(), err))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name(s: &str) -> CacheName {
        CacheName::parse(s).unwrap()
    }

    fn html(body: &'static str) -> CacheEntry {
        CacheEntry::new(CapturedResponse::ok("text/html; charset=utf-8", body))
    }

    #[tokio::test]
    async fn test_missing_root_has_no_caches() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path().join("absent"));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip_preserves_headers() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());
        let key = RequestKey::get("/offline.html");
        let original = html("<h1>Offline</h1>");

        store.put(&name("app-v1"), key.clone(), original.clone()).await.unwrap();
        let found = store.get(&name("app-v1"), &key).await.unwrap().unwrap();

        assert_eq!(found, original);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let key = RequestKey::get("/");
        DiskCacheStorage::new(tmp.path())
            .put(&name("app-v1"), key.clone(), html("shell"))
            .await
            .unwrap();

        let reopened = DiskCacheStorage::new(tmp.path());
        let found = reopened.get(&name("app-v1"), &key).await.unwrap().unwrap();
        assert_eq!(&found.response.body[..], b"shell");
    }

    #[tokio::test]
    async fn test_replace_removes_old_body() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());
        let key = RequestKey::get("/");

        store.put(&name("app-v1"), key.clone(), html("one")).await.unwrap();
        store.put(&name("app-v1"), key.clone(), html("two")).await.unwrap();

        let found = store.get(&name("app-v1"), &key).await.unwrap().unwrap();
        assert_eq!(&found.response.body[..], b"two");

        let mut files = std::fs::read_dir(tmp.path().join("app-v1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        files.sort();
        assert_eq!(files.len(), 2, "one metadata file and one body: {:?}", files);
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_body() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());
        let key = RequestKey::get("/static/app.js");
        let cache = name("app-v1");
        store.open(&cache).await.unwrap();

        let bodies = ["a", "b", "c", "d", "e", "f", "g", "h"];
        futures::future::join_all(
            bodies
                .iter()
                .map(|body| store.put(&cache, key.clone(), html(*body))),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()
        .unwrap();

        let files = std::fs::read_dir(tmp.path().join("app-v1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(files.len(), 2, "one metadata file and one body: {:?}", files);

        let found = store.get(&name("app-v1"), &key).await.unwrap().unwrap();
        assert!(bodies.iter().any(|body| found.response.body == body.as_bytes()));
    }

    #[tokio::test]
    async fn test_put_existing_skips_deleted_cache() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());
        let key = RequestKey::get("/");

        assert!(!store.put_existing(&name("app-v1"), key.clone(), html("x")).await.unwrap());
        assert!(store.keys().await.unwrap().is_empty());

        store.open(&name("app-v1")).await.unwrap();
        assert!(store.put_existing(&name("app-v1"), key.clone(), html("x")).await.unwrap());
        assert!(store.get(&name("app-v1"), &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entries_and_keys() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());

        store
            .put(&name("app-v2"), RequestKey::get("/b"), html("b"))
            .await
            .unwrap();
        store
            .put(&name("app-v2"), RequestKey::get("/a"), html("a"))
            .await
            .unwrap();
        store.open(&name("app-v1")).await.unwrap();

        assert_eq!(
            store.keys().await.unwrap(),
            vec![name("app-v1"), name("app-v2")]
        );
        assert_eq!(
            store.entries(&name("app-v2")).await.unwrap(),
            vec![RequestKey::get("/a"), RequestKey::get("/b")]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_directory() {
        let tmp = TempDir::new().unwrap();
        let store = DiskCacheStorage::new(tmp.path());
        store
            .put(&name("app-v1"), RequestKey::get("/"), html("x"))
            .await
            .unwrap();

        assert!(store.delete(&name("app-v1")).await.unwrap());
        assert!(store.keys().await.unwrap().is_empty());
        assert!(!store.delete(&name("app-v1")).await.unwrap());
        assert!(store
            .get(&name("app-v1"), &RequestKey::get("/"))
            .await
            .unwrap()
            .is_none());
    }
}
