//! Control Channel
//!
//! Narrow inbound command interface for the hosted page. Commands are only
//! honoured when the sender's origin equals the layer's own origin.

use serde::Serialize;
use url::{Origin, Url};

use crate::error::{Result, WorkerError};
use crate::models::ControlMessage;

/// How an inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    Applied(ControlMessage),
    /// Sender origin missing or different from ours
    IgnoredForeignOrigin,
    /// Not a recognised command
    IgnoredUnknown,
}

// == Control Channel ==
#[derive(Debug, Clone)]
pub struct ControlChannel {
    origin: Origin,
}

impl ControlChannel {
    /// Creates a channel bound to `own_origin` (e.g. `https://expenses.example.com`).
    pub fn new(own_origin: &str) -> Result<Self> {
        let origin = Url::parse(own_origin)
            .map_err(|e| WorkerError::Config(format!("PUBLIC_ORIGIN '{}': {}", own_origin, e)))?
            .origin();
        if !origin.is_tuple() {
            return Err(WorkerError::Config(format!(
                "PUBLIC_ORIGIN '{}' has no usable origin",
                own_origin
            )));
        }
        Ok(Self { origin })
    }

    /// True when `sender` names exactly our scheme, host and port.
    pub fn accepts(&self, sender: Option<&str>) -> bool {
        sender
            .and_then(|sender| Url::parse(sender).ok())
            .map(|url| url.origin() == self.origin)
            .unwrap_or(false)
    }

    /// Validates the sender and decodes the command. `Err` carries the
    /// outcome for messages that must be ignored.
    pub fn receive(
        &self,
        sender: Option<&str>,
        payload: &[u8],
    ) -> std::result::Result<ControlMessage, ControlOutcome> {
        if !self.accepts(sender) {
            return Err(ControlOutcome::IgnoredForeignOrigin);
        }
        serde_json::from_slice(payload).map_err(|_| ControlOutcome::IgnoredUnknown)
    }
}
