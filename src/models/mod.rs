//! Request and Response models for the offline proxy
//!
//! DTOs for the control channel and the JSON bodies the layer produces.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::ControlMessage;
pub use responses::{HealthResponse, OfflineApiBody, StatusResponse};
