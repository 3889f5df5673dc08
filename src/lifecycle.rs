//! Lifecycle Controller
//!
//! Drives one scope's instances through
//! `Installing -> Waiting -> Activating -> Active -> Redundant`, populating the
//! new version's cache at install and reclaiming superseded caches at
//! activation.
//!
//! The active instance's cache name is the only notion of "current cache";
//! there is no separate pointer to go stale.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, CacheName, CacheStorage, RequestKey};
use crate::error::{Result, WorkerError};
use crate::events::WorkerNotification;
use crate::manifest::Manifest;
use crate::network::Network;

// == Lifecycle State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

// == Worker Instance ==
/// One installed version of the layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerInstance {
    pub id: u64,
    pub cache_name: CacheName,
    pub state: LifecycleState,
}

/// The instances currently registered for the scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LifecycleSnapshot {
    pub installing: Option<WorkerInstance>,
    /// Waiting, or activating while an activation is in flight
    pub waiting: Option<WorkerInstance>,
    pub active: Option<WorkerInstance>,
}

/// What one activation reclaimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationReport {
    pub cache_name: CacheName,
    pub removed: Vec<CacheName>,
    /// Stale caches whose deletion failed; retried on the next activation
    pub failed: Vec<CacheName>,
}

// == Lifecycle Controller ==
pub struct LifecycleController {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    registration: RwLock<LifecycleSnapshot>,
    /// Serializes activation events
    activation: Mutex<()>,
    next_id: AtomicU64,
    notifier: broadcast::Sender<WorkerNotification>,
}

impl LifecycleController {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        notifier: broadcast::Sender<WorkerNotification>,
    ) -> Self {
        Self {
            storage,
            network,
            registration: RwLock::new(LifecycleSnapshot::default()),
            activation: Mutex::new(()),
            next_id: AtomicU64::new(1),
            notifier,
        }
    }

    /// Current registration state.
    pub async fn snapshot(&self) -> LifecycleSnapshot {
        self.registration.read().await.clone()
    }

    /// Cache name of the active instance, if any.
    pub async fn current_cache(&self) -> Option<CacheName> {
        self.registration
            .read()
            .await
            .active
            .as_ref()
            .map(|instance| instance.cache_name.clone())
    }

    /// State of the instance with `id`. Instances no longer registered are
    /// redundant; unknown ids yield `None`.
    pub async fn state_of(&self, id: u64) -> Option<LifecycleState> {
        let registration = self.registration.read().await;
        let registered = [
            &registration.installing,
            &registration.waiting,
            &registration.active,
        ]
        .into_iter()
        .flatten()
        .find(|instance| instance.id == id)
        .map(|instance| instance.state);

        match registered {
            Some(state) => Some(state),
            None if id > 0 && id < self.next_id.load(Ordering::SeqCst) => {
                Some(LifecycleState::Redundant)
            }
            None => None,
        }
    }

    // == Install ==
    /// Installs a new instance whose cache is `cache_name`.
    ///
    /// Every manifest entry must be fetched with a success status before any is
    /// stored; one failure fails the install and the instance becomes
    /// redundant without ever reaching `Waiting`. On success the instance waits,
    /// or activates immediately when nothing is active yet.
    ///
    /// A failed install still succeeds when nothing is active and storage
    /// already holds every manifest entry under `cache_name`, as a durable
    /// store does after a restart while offline.
    pub async fn install(&self, cache_name: CacheName, manifest: &Manifest) -> Result<WorkerInstance> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut instance = WorkerInstance {
            id,
            cache_name: cache_name.clone(),
            state: LifecycleState::Installing,
        };
        self.registration.write().await.installing = Some(instance.clone());
        info!(
            "Installing {} ({} manifest entries)",
            cache_name,
            manifest.len()
        );

        if let Err(e) = self.populate(&cache_name, manifest).await {
            if self.can_resume(&cache_name, manifest).await {
                warn!(
                    "Install of {} failed ({}); resuming the stored copy",
                    cache_name, e
                );
            } else {
                {
                    let mut registration = self.registration.write().await;
                    if registration.installing.as_ref().map(|i| i.id) == Some(id) {
                        registration.installing = None;
                    }
                }
                let reason = e.to_string();
                error!("Install of {} failed: {}", cache_name, reason);
                let _ = self.notifier.send(WorkerNotification::InstallFailed {
                    cache: cache_name.clone(),
                    reason: reason.clone(),
                });
                return Err(WorkerError::InstallFailed {
                    cache: cache_name.to_string(),
                    reason,
                });
            }
        }

        instance.state = LifecycleState::Waiting;
        let activate_now = {
            let mut registration = self.registration.write().await;
            if registration.installing.as_ref().map(|i| i.id) == Some(id) {
                registration.installing = None;
            }
            if let Some(previous) = registration.waiting.replace(instance.clone()) {
                info!(
                    "Waiting instance {} ({}) superseded by {}",
                    previous.id, previous.cache_name, cache_name
                );
            }
            registration.active.is_none()
        };
        info!("Installed {}; waiting", cache_name);
        let _ = self.notifier.send(WorkerNotification::Installed {
            cache: cache_name.clone(),
        });

        if activate_now {
            self.activate().await?;
            instance.state = LifecycleState::Active;
        }
        Ok(instance)
    }

    /// Fetches every manifest entry, then stores them all in `cache_name`.
    async fn populate(&self, cache_name: &CacheName, manifest: &Manifest) -> Result<()> {
        let requests = manifest.requests();
        let fetched = try_join_all(requests.iter().map(|request| async move {
            let response = self.network.fetch(request).await?;
            if !response.is_cacheable() {
                return Err(WorkerError::Network(format!(
                    "{} returned {}",
                    request.path_and_query(),
                    response.status
                )));
            }
            Ok((RequestKey::for_request(request), response))
        }))
        .await?;

        self.storage.open(cache_name).await?;
        for (key, response) in fetched {
            debug!("Precaching {} into {}", key, cache_name);
            if let Err(e) = self
                .storage
                .put(cache_name, key, CacheEntry::new(response))
                .await
            {
                self.discard_partial(cache_name).await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Removes a partially populated cache unless the active instance uses it.
    async fn discard_partial(&self, cache_name: &CacheName) {
        if self.current_cache().await.as_ref() == Some(cache_name) {
            return;
        }
        if let Err(e) = self.storage.delete(cache_name).await {
            warn!("Failed to discard partial cache {}: {}", cache_name, e);
        }
    }

    /// True when nothing is active and `cache_name` already holds every
    /// manifest entry.
    async fn can_resume(&self, cache_name: &CacheName, manifest: &Manifest) -> bool {
        if self.current_cache().await.is_some() {
            return false;
        }
        let stored = match self.storage.entries(cache_name).await {
            Ok(stored) => stored,
            Err(e) => {
                debug!("No stored copy of {} to resume: {}", cache_name, e);
                return false;
            }
        };
        !stored.is_empty()
            && manifest
                .requests()
                .iter()
                .all(|request| stored.contains(&RequestKey::for_request(request)))
    }

    // == Activate ==
    /// Activates the waiting instance, deleting every cache but its own.
    ///
    /// With nothing waiting, re-runs reclamation for the active instance, so
    /// a second call is a no-op. Deletion failures are logged per cache and
    /// never abort the activation.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let _activation = self.activation.lock().await;

        let target = {
            let mut registration = self.registration.write().await;
            if let Some(waiting) = registration.waiting.as_mut() {
                waiting.state = LifecycleState::Activating;
                waiting.clone()
            } else if let Some(active) = registration.active.as_ref() {
                active.clone()
            } else {
                let observed = registration.installing.as_ref().map(|i| i.state);
                return Err(WorkerError::invalid_state("waiting", observed));
            }
        };

        if target.state == LifecycleState::Activating {
            info!("Activating {}", target.cache_name);
        }
        let report = self.reclaim(&target.cache_name).await;

        if target.state == LifecycleState::Activating {
            let mut registration = self.registration.write().await;
            if registration.waiting.as_ref().map(|i| i.id) == Some(target.id) {
                registration.waiting = None;
            }
            if let Some(previous) = registration.active.take() {
                info!(
                    "Instance {} ({}) is now redundant",
                    previous.id, previous.cache_name
                );
            }
            registration.active = Some(WorkerInstance {
                state: LifecycleState::Active,
                ..target.clone()
            });
            info!("Activated {}", target.cache_name);
        }

        let _ = self.notifier.send(WorkerNotification::Activated {
            cache: report.cache_name.clone(),
            removed: report.removed.clone(),
        });
        Ok(report)
    }

    /// Deletes every cache other than `current`, concurrently.
    async fn reclaim(&self, current: &CacheName) -> ActivationReport {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not enumerate caches during activation: {}", e);
                Vec::new()
            }
        };

        let stale: Vec<CacheName> = names.into_iter().filter(|name| name != current).collect();
        let results = join_all(stale.into_iter().map(|name| async move {
            let result = self.storage.delete(&name).await;
            (name, result)
        }))
        .await;

        let mut report = ActivationReport {
            cache_name: current.clone(),
            removed: Vec::new(),
            failed: Vec::new(),
        };
        for (name, result) in results {
            match result {
                Ok(_) => {
                    info!("Deleted superseded cache {}", name);
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete superseded cache {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }
        report
    }

    // == Promote Now ==
    /// Moves a waiting instance straight into activation without waiting for
    /// the active one to release its clients. No-op when nothing is waiting.
    pub async fn promote_now(&self) -> Result<Option<ActivationReport>> {
        let waiting = self
            .registration
            .read()
            .await
            .waiting
            .as_ref()
            .filter(|instance| instance.state == LifecycleState::Waiting)
            .map(|instance| instance.cache_name.clone());

        let Some(cache_name) = waiting else {
            debug!("Promote requested with no waiting instance");
            return Ok(None);
        };

        info!("Promoting {} without waiting", cache_name);
        let _ = self
            .notifier
            .send(WorkerNotification::Promoted { cache: cache_name });
        self.activate().await.map(Some)
    }
}
