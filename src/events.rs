//! Worker Events
//!
//! The dispatch table vocabulary: events a harness delivers to the worker,
//! the outcomes it gets back, and the notifications published for observers.

use axum::body::Bytes;
use serde::Serialize;

use crate::cache::{CacheName, RequestKey};
use crate::control::ControlOutcome;
use crate::error::Result;
use crate::lifecycle::{ActivationReport, WorkerInstance};
use crate::request::InterceptedRequest;
use crate::strategy::FetchOutcome;

/// Capacity of the notification channel; slow subscribers lose the oldest.
pub const NOTIFICATION_CAPACITY: usize = 64;

// == Worker Event ==
/// An event delivered to the worker by its hosting harness.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Install the configured version
    Install,
    /// Activate the waiting version (or re-run reclamation for the active one)
    Activate,
    /// Offer a request for interception
    Fetch(InterceptedRequest),
    /// Inbound control message with the sender's origin
    Message {
        origin: Option<String>,
        payload: Bytes,
    },
}

// == Event Outcome ==
/// Result of dispatching one event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(WorkerInstance),
    InstallFailed(String),
    Activated(ActivationReport),
    ActivationFailed(String),
    Fetch(Result<FetchOutcome>),
    Message(ControlOutcome),
}

// == Worker Notification ==
/// Lifecycle and error notifications published on the worker's broadcast
/// channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerNotification {
    Installed {
        cache: CacheName,
    },
    InstallFailed {
        cache: CacheName,
        reason: String,
    },
    Activated {
        cache: CacheName,
        removed: Vec<CacheName>,
    },
    Promoted {
        cache: CacheName,
    },
    BackgroundRefreshFailed {
        key: RequestKey,
        reason: String,
    },
}
