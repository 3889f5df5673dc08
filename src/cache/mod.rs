//! Cache Module
//!
//! Versioned named caches mapping request identities to captured responses.

mod disk;
mod entry;
mod key;
mod name;
mod stats;
mod storage;
mod store;


// Re-export public types
pub use disk::DiskCacheStorage;
pub use entry::{strip_hop_by_hop, CacheEntry, CapturedResponse};
pub use key::RequestKey;
pub use name::CacheName;
pub use stats::CacheStats;
pub use storage::CacheStorage;
pub use store::MemoryCacheStorage;
