//! Content-addressed node storage.

use std::io;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use thiserror::Error;

use crate::merkle::Digest;

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A content-addressed byte store for serialized trie nodes.
///
/// Keys are the Keccak digests of the stored bytes, so a write can never
/// clobber diverging content and rewriting an existing node is a no-op.
/// Implementations must be safe to share across threads.
pub trait NodeStore: Send + Sync {
    /// Fetches the encoding stored under `digest`.
    fn get(&self, digest: &Digest) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `bytes` under `digest`.
    fn put(&self, digest: &Digest, bytes: &[u8]) -> Result<(), StoreError>;
}

/// In-memory node store backed by a hash map.
pub struct MemoryNodeStore {
    nodes: RwLock<FastHashMap<Digest, Vec<u8>>>,
}

impl MemoryNodeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(FastHashMap::with_hasher(FxBuildHasher)),
        }
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Returns true if `digest` is present.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.nodes.read().contains_key(digest)
    }

    /// Drops every stored node. Lets tests simulate a lost or corrupted
    /// backend.
    pub fn clear(&self) {
        self.nodes.write().clear();
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, digest: &Digest) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.nodes.read().get(digest).cloned())
    }

    fn put(&self, digest: &Digest, bytes: &[u8]) -> Result<(), StoreError> {
        self.nodes.write().insert(*digest, bytes.to_vec());
        Ok(())
    }
}
