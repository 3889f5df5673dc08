//! Background Tasks Module
//!
//! Work that runs beside request handling so it never blocks the host page.
//!
//! # Tasks
//! - Install: installs the configured version at startup
//! - Cache writes: fire-and-forget stores after network-first fetches

mod install;
mod refresh;

pub use install::spawn_install_task;
pub use refresh::spawn_cache_write;
