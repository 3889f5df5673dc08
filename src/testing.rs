//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::Notify;

use crate::cache::{CacheEntry, CacheName, CacheStorage, CapturedResponse, MemoryCacheStorage, RequestKey};
use crate::error::{Result, WorkerError};
use crate::network::Network;
use crate::request::InterceptedRequest;

/// Scripted origin: fixed responses per path-and-query, a global online
/// switch, per-path failures, gated paths and a call log.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, CapturedResponse>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    offline: AtomicBool,
}

impl FakeNetwork {
    /// Serves `"<path> body"` as `text/plain` for every path.
    pub fn serving(paths: &[&str]) -> Self {
        let network = Self::default();
        for path in paths {
            network.respond(path, CapturedResponse::ok("text/plain", format!("{} body", path)));
        }
        network
    }

    pub fn respond(&self, path: &str, response: CapturedResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    pub fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    /// Holds every fetch of `path` until the returned gate is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), gate.clone());
        gate
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Number of fetches seen for `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CapturedResponse> {
        let path = request.path_and_query().to_string();
        self.calls.lock().unwrap().push(path.clone());

        let gate = self.gates.lock().unwrap().get(&path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&path) {
            return Err(WorkerError::Network(format!("{}: connection refused", path)));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| {
                CapturedResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "not found")
            }))
    }
}

/// Memory storage whose `delete` of one cache always fails.
pub struct FailingDeleteStorage {
    inner: MemoryCacheStorage,
    undeletable: CacheName,
}

impl FailingDeleteStorage {
    pub fn new(undeletable: CacheName) -> Self {
        Self {
            inner: MemoryCacheStorage::new(),
            undeletable,
        }
    }
}

#[async_trait]
impl CacheStorage for FailingDeleteStorage {
    async fn open(&self, name: &CacheName) -> Result<()> {
        self.inner.open(name).await
    }

    async fn get(&self, name: &CacheName, key: &RequestKey) -> Result<Option<CacheEntry>> {
        self.inner.get(name, key).await
    }

    async fn put(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<()> {
        self.inner.put(name, key, entry).await
    }

    async fn put_existing(&self, name: &CacheName, key: RequestKey, entry: CacheEntry) -> Result<bool> {
        self.inner.put_existing(name, key, entry).await
    }

    async fn delete(&self, name: &CacheName) -> Result<bool> {
        if *name == self.undeletable {
            return Err(WorkerError::Storage(format!("{} is locked", name)));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<CacheName>> {
        self.inner.keys().await
    }

    async fn entries(&self, name: &CacheName) -> Result<Vec<RequestKey>> {
        self.inner.entries(name).await
    }
}
