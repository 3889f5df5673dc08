//! Offline Proxy - An offline-first caching layer in front of a web origin

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_proxy::api::create_router;
use offline_proxy::cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
use offline_proxy::network::HttpNetwork;
use offline_proxy::{spawn_install_task, AppState, Config, OfflineWorker, WorkerSettings};

/// Main entry point for the offline proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Pick the cache storage (disk when CACHE_DIR is set, memory otherwise)
/// 4. Start the background install of the configured version
/// 5. Create Axum router and start the HTTP server
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, public_origin={}, cache={}-{}, port={}, fast_iteration={}",
        config.origin_url,
        config.public_origin,
        config.cache_prefix,
        config.cache_version,
        config.server_port,
        config.fast_iteration
    );

    let storage: Arc<dyn CacheStorage> = match &config.cache_dir {
        Some(dir) => {
            let disk = DiskCacheStorage::new(dir.clone());
            info!("Using disk cache storage at {}", disk.root().display());
            Arc::new(disk)
        }
        None => {
            info!("Using in-memory cache storage");
            Arc::new(MemoryCacheStorage::new())
        }
    };
    let network = Arc::new(HttpNetwork::new(&config.origin_url)?);
    let settings = WorkerSettings::from_config(&config).context("invalid worker settings")?;
    let worker = Arc::new(OfflineWorker::new(settings, storage, network));

    let install_handle = spawn_install_task(worker.clone());
    info!("Background install task started");

    let app = create_router(AppState::from_config(worker, &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(install_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the install task if it is still running.
async fn shutdown_signal(install_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if !install_handle.is_finished() {
        install_handle.abort();
        warn!("Install task aborted");
    }
}
