//! Request DTOs for the control channel
//!
//! Defines the structure of incoming control message bodies.

use serde::{Deserialize, Serialize};

/// Command sent by the hosted page, e.g. `{"type": "PROMOTE_NOW"}`.
///
/// Unknown `type` values fail to deserialize and are ignored by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now
    PromoteNow,
}
