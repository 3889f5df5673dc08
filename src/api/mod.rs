//! API Module
//!
//! HTTP surface of the offline proxy.
//!
//! # Endpoints
//! - `POST /__offline/message` - Control channel
//! - `GET /__offline/status` - Lifecycle snapshot and statistics
//! - `GET /__offline/health` - Health check endpoint
//! - everything else - Interception handler

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
