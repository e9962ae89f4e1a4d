//! Cache registry shared across tries.
//!
//! One trie engine typically serves a world trie plus one storage trie
//! per account. The registry hands out a fixed cache for the world trie
//! and lazily materializes one cache per account id, so repeated opens
//! of the same account's trie share slots and hit statistics.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashMap;
use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

use super::node_cache::NodeCache;

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// Memory-tier depth of the world trie cache.
pub const WORLD_CACHE_DEPTH: u32 = 5;

/// Hands out node caches keyed by account id.
pub struct CacheManager {
    world: Arc<NodeCache>,
    /// Memory-tier depth for account caches; 0 disables them.
    mem_depth: u32,
    /// File-tier depth for account caches; at most `mem_depth` means no
    /// file tier.
    file_depth: u32,
    dir: Option<PathBuf>,
    accounts: Mutex<FastHashMap<Vec<u8>, Arc<NodeCache>>>,
}

impl CacheManager {
    /// Creates a registry. Account caches get a file tier under `dir`
    /// when it is given and `file_depth` exceeds `mem_depth`.
    pub fn new(mem_depth: u32, file_depth: u32, dir: Option<PathBuf>) -> Self {
        let dir = dir.filter(|dir| match fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(error) => {
                debug!("cache directory {} unavailable: {error}", dir.display());
                false
            }
        });
        Self {
            world: Arc::new(NodeCache::new(WORLD_CACHE_DEPTH)),
            mem_depth,
            file_depth,
            dir,
            accounts: Mutex::new(FastHashMap::with_hasher(FxBuildHasher)),
        }
    }

    /// Cache for the world trie. Memory tier only; the world trie is hot
    /// enough that a file tier would only add latency.
    pub fn world_cache(&self) -> Arc<NodeCache> {
        Arc::clone(&self.world)
    }

    /// Cache for one account's storage trie, memoized per id. Returns
    /// `None` when account caching is disabled.
    pub fn account_cache(&self, id: &[u8]) -> Option<Arc<NodeCache>> {
        if self.mem_depth == 0 {
            return None;
        }
        let mut accounts = self.accounts.lock();
        if let Some(cache) = accounts.get(id) {
            return Some(Arc::clone(cache));
        }
        let cache = Arc::new(self.build_account_cache(id));
        accounts.insert(id.to_vec(), Arc::clone(&cache));
        Some(cache)
    }

    fn build_account_cache(&self, id: &[u8]) -> NodeCache {
        if let Some(dir) = &self.dir {
            if self.file_depth > self.mem_depth {
                let name: String = id.iter().map(|byte| format!("{byte:02x}")).collect();
                let path = dir.join(name);
                match NodeCache::with_file_tier(self.mem_depth, self.file_depth, &path) {
                    Ok(cache) => {
                        debug!("opened file cache tier at {}", path.display());
                        return cache;
                    }
                    Err(error) => {
                        debug!("file cache tier unavailable ({error}); using memory only");
                    }
                }
            }
        }
        NodeCache::new(self.mem_depth)
    }
}
