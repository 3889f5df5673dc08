//! Offline Worker
//!
//! Ties the lifecycle controller, classifier, strategies, offline fallback and
//! control channel together behind one event dispatch table.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheName, CacheStats, CacheStorage, CapturedResponse};
use crate::classify::Classifier;
use crate::config::Config;
use crate::control::{ControlChannel, ControlOutcome};
use crate::error::Result;
use crate::events::{EventOutcome, WorkerEvent, WorkerNotification, NOTIFICATION_CAPACITY};
use crate::fallback::OfflineFallback;
use crate::lifecycle::{ActivationReport, LifecycleController, LifecycleSnapshot, WorkerInstance};
use crate::manifest::Manifest;
use crate::models::ControlMessage;
use crate::network::Network;
use crate::request::InterceptedRequest;
use crate::strategy::{FetchOutcome, FetchStrategy, StrategyContext};

// == Worker Settings ==
/// Validated settings for one worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Cache the configured version installs into
    pub cache_name: CacheName,
    pub manifest: Manifest,
    pub offline_page: String,
    pub classifier: Classifier,
    pub fast_iteration: bool,
    pub control: ControlChannel,
}

impl WorkerSettings {
    /// Builds settings from configuration. Fails when the cache name is not
    /// usable, the manifest is invalid or lacks the offline page, or the
    /// public origin cannot be parsed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let manifest = Manifest::new(&config.precache_manifest)?;
        manifest.require(&config.offline_page)?;

        Ok(Self {
            cache_name: CacheName::versioned(&config.cache_prefix, &config.cache_version)?,
            manifest,
            offline_page: config.offline_page.clone(),
            classifier: Classifier::from_config(config),
            fast_iteration: config.fast_iteration,
            control: ControlChannel::new(&config.public_origin)?,
        })
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default()).expect("default configuration is valid")
    }
}

// == Offline Worker ==
pub struct OfflineWorker {
    settings: WorkerSettings,
    lifecycle: LifecycleController,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    fallback: OfflineFallback,
    stats: Arc<RwLock<CacheStats>>,
    notifier: broadcast::Sender<WorkerNotification>,
}

impl OfflineWorker {
    pub fn new(
        settings: WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            lifecycle: LifecycleController::new(storage.clone(), network.clone(), notifier.clone()),
            fallback: OfflineFallback::new(&settings.offline_page),
            settings,
            storage,
            network,
            stats: Arc::new(RwLock::new(CacheStats::new())),
            notifier,
        }
    }

    // == Dispatch ==
    /// Routes one event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> EventOutcome {
        match event {
            WorkerEvent::Install => match self.install().await {
                Ok(instance) => EventOutcome::Installed(instance),
                Err(e) => EventOutcome::InstallFailed(e.to_string()),
            },
            WorkerEvent::Activate => match self.activate().await {
                Ok(report) => EventOutcome::Activated(report),
                Err(e) => EventOutcome::ActivationFailed(e.to_string()),
            },
            WorkerEvent::Fetch(request) => EventOutcome::Fetch(self.handle_fetch(&request).await),
            WorkerEvent::Message { origin, payload } => {
                EventOutcome::Message(self.handle_message(origin.as_deref(), &payload).await)
            }
        }
    }

    /// Installs the configured version.
    pub async fn install(&self) -> Result<WorkerInstance> {
        self.lifecycle
            .install(self.settings.cache_name.clone(), &self.settings.manifest)
            .await
    }

    pub async fn activate(&self) -> Result<ActivationReport> {
        let report = self.lifecycle.activate().await?;
        self.stats
            .write()
            .await
            .record_caches_deleted(report.removed.len());
        Ok(report)
    }

    pub async fn promote_now(&self) -> Result<Option<ActivationReport>> {
        let report = self.lifecycle.promote_now().await?;
        if let Some(report) = &report {
            self.stats
                .write()
                .await
                .record_caches_deleted(report.removed.len());
        }
        Ok(report)
    }

    // == Fetch ==
    /// Offers a request to the layer.
    ///
    /// Requests are declined when uncategorized or when no version is active.
    /// Otherwise the category's strategy runs against the cache that is
    /// current at the moment of classification.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<FetchOutcome> {
        let category = self.settings.classifier.classify(request);
        let strategy = FetchStrategy::for_category(category, self.settings.fast_iteration);

        let cache = match (strategy, self.lifecycle.current_cache().await) {
            (FetchStrategy::PassThrough, _) | (_, None) => {
                self.stats.write().await.record_pass_through();
                return Ok(FetchOutcome::PassThrough);
            }
            (_, Some(cache)) => cache,
        };
        debug!(
            "{} {} classified as {}",
            request.method,
            request.path_and_query(),
            category
        );

        let ctx = StrategyContext {
            storage: self.storage.clone(),
            network: self.network.clone(),
            cache,
            stats: self.stats.clone(),
            notifier: self.notifier.clone(),
        };
        strategy.execute(&ctx, request, &self.fallback).await
    }

    /// Sends a declined request to the network untouched.
    pub async fn forward(&self, request: &InterceptedRequest) -> Result<CapturedResponse> {
        self.network.fetch(request).await
    }

    // == Message ==
    /// Handles an inbound control message. Foreign senders are dropped
    /// without logging; unknown commands are ignored.
    pub async fn handle_message(&self, sender_origin: Option<&str>, payload: &[u8]) -> ControlOutcome {
        let message = match self.settings.control.receive(sender_origin, payload) {
            Ok(message) => message,
            Err(ControlOutcome::IgnoredUnknown) => {
                debug!("Ignoring unrecognised control message");
                return ControlOutcome::IgnoredUnknown;
            }
            Err(outcome) => return outcome,
        };

        match message {
            ControlMessage::PromoteNow => {
                if let Err(e) = self.promote_now().await {
                    warn!("Promote request failed: {}", e);
                }
            }
        }
        ControlOutcome::Applied(message)
    }

    // == Observability ==
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerNotification> {
        self.notifier.subscribe()
    }

    pub async fn snapshot(&self) -> LifecycleSnapshot {
        self.lifecycle.snapshot().await
    }

    pub async fn current_cache(&self) -> Option<CacheName> {
        self.lifecycle.current_cache().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Direct access to the lifecycle controller, e.g. to install a version
    /// other than the configured one.
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }
}
