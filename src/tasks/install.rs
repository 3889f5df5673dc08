//! Startup Install Task
//!
//! Installs the configured version in the background. Until it activates,
//! every request passes straight through to the origin.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::events::{EventOutcome, WorkerEvent};
use crate::worker::OfflineWorker;

/// Spawns a task that dispatches the install event to `worker`.
///
/// Install failure is not fatal: it is logged and the proxy keeps forwarding
/// requests uncached (or keeps serving from a previously active version).
///
/// # Returns
/// A JoinHandle for the spawned task, which can be aborted during shutdown.
pub fn spawn_install_task(worker: Arc<OfflineWorker>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match worker.dispatch(WorkerEvent::Install).await {
            EventOutcome::Installed(instance) => info!(
                "Instance {} ({}) is {}",
                instance.id, instance.cache_name, instance.state
            ),
            EventOutcome::InstallFailed(reason) => {
                warn!("Install failed, requests go to the network uncached: {}", reason)
            }
            other => warn!("Unexpected install outcome: {:?}", other),
        }
    })
}
