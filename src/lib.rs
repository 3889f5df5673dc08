//! Offline Proxy - An offline-first caching layer in front of a web origin
//!
//! Intercepts requests, serves them from versioned caches according to their
//! category, and falls back to an offline page or a synthesized response
//! when the origin cannot be reached.

pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod fallback;
pub mod lifecycle;
pub mod manifest;
pub mod models;
pub mod network;
pub mod request;
pub mod strategy;
pub mod tasks;
pub mod worker;

#[cfg(test)]
mod testing;

pub use api::AppState;
pub use config::Config;
pub use error::{Result, WorkerError};
pub use tasks::spawn_install_task;
pub use worker::{OfflineWorker, WorkerSettings};
