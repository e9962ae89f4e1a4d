//! Node persistence and caching.
//!
//! This module implements the content-addressed backing store the trie
//! reads and flushes through, plus the positional caches layered in
//! front of it.

mod cache_manager;
mod node_cache;
mod node_store;

pub use cache_manager::{CacheManager, WORLD_CACHE_DEPTH};
pub use node_cache::{CacheStats, NodeCache};
pub use node_store::{MemoryNodeStore, NodeStore, StoreError};
