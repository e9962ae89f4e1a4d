//! Positional node cache.
//!
//! Trie nodes near the root are read on almost every lookup, so the cache
//! keys entries by position rather than by digest: each nibble path from
//! the root maps to one fixed slot, laid out like a 16-ary heap. A slot
//! holds at most one entry and is validated against the digest the reader
//! expects, so stale entries are simply misses.
//!
//! Two tiers cover different depth bands. Paths shorter than the memory
//! depth live in an in-memory slot vector; paths between the memory depth
//! and the file depth live in a memory-mapped file of fixed-size records,
//! which survives process restarts. Deeper nodes are not cached.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::merkle::{Digest, HASH_SIZE};

/// Largest node encoding a file-tier record can hold. Bigger nodes skip
/// the file tier and fall through to the store.
const RECORD_DATA_SIZE: usize = 512;

/// File record layout: u16 length, digest, data.
const RECORD_SIZE: usize = 2 + HASH_SIZE + RECORD_DATA_SIZE;

/// Number of heap slots covering every nibble path shorter than `depth`.
fn slots_for_depth(depth: u32) -> usize {
    (16usize.pow(depth) - 1) / 15
}

/// Heap index of a nibble path: the root sits at 0, child `n` of slot
/// `i` at `i * 16 + n + 1`. Callers bound `path` by the cache depth.
fn slot_index(path: &[u8]) -> usize {
    let mut index = 0usize;
    for &nibble in path {
        index = index * 16 + nibble as usize + 1;
    }
    index
}

/// Cache hit/miss counters.
///
/// All counters are atomic for thread-safe access.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// A point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Returns the hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hits / {} misses ({:.1}%)",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

/// Two-tier positional cache for serialized trie nodes.
pub struct NodeCache {
    /// Paths shorter than this live in the memory tier.
    mem_depth: u32,
    mem: Mutex<Vec<Option<(Digest, Vec<u8>)>>>,
    /// Paths shorter than this (but at least `mem_depth`) live in the
    /// file tier; equals `mem_depth` when there is none.
    file_depth: u32,
    file: Option<Mutex<MmapMut>>,
    counters: Counters,
}

impl NodeCache {
    /// Creates a memory-only cache covering paths shorter than
    /// `mem_depth` nibbles.
    pub fn new(mem_depth: u32) -> Self {
        Self {
            mem_depth,
            mem: Mutex::new(vec![None; slots_for_depth(mem_depth)]),
            file_depth: mem_depth,
            file: None,
            counters: Counters::default(),
        }
    }

    /// Creates a cache with a file tier for paths between `mem_depth`
    /// and `file_depth` nibbles, mapped at `path`. An existing file is
    /// reused; its stale entries fail their digest check and fall out
    /// naturally.
    pub fn with_file_tier<P: AsRef<Path>>(
        mem_depth: u32,
        file_depth: u32,
        path: P,
    ) -> io::Result<Self> {
        let mut cache = Self::new(mem_depth);
        if file_depth <= mem_depth {
            return Ok(cache);
        }
        let records = slots_for_depth(file_depth) - slots_for_depth(mem_depth);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        file.set_len((records * RECORD_SIZE) as u64)?;
        // Safety: the mapping is only touched through the Mutex.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        trace!(
            "attached file cache tier at {} ({records} records)",
            path.as_ref().display()
        );

        cache.file_depth = file_depth;
        cache.file = Some(Mutex::new(mmap));
        Ok(cache)
    }

    /// Creates a cache whose second tier is an anonymous mapping instead
    /// of a file. Mostly useful for tests and benchmarks.
    pub fn with_anon_tier(mem_depth: u32, file_depth: u32) -> io::Result<Self> {
        let mut cache = Self::new(mem_depth);
        if file_depth <= mem_depth {
            return Ok(cache);
        }
        let records = slots_for_depth(file_depth) - slots_for_depth(mem_depth);
        let mmap = MmapMut::map_anon(records * RECORD_SIZE)?;
        cache.file_depth = file_depth;
        cache.file = Some(Mutex::new(mmap));
        Ok(cache)
    }

    /// Looks up the node at `path` whose digest the caller expects.
    pub fn get(&self, path: &[u8], digest: &Digest) -> Option<Vec<u8>> {
        let found = self.lookup(path, digest);
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Caches the node at `path`. Entries beyond the covered depth, and
    /// file-tier entries larger than a record, are dropped silently.
    pub fn put(&self, path: &[u8], digest: &Digest, bytes: &[u8]) {
        let depth = path.len() as u32;
        if depth < self.mem_depth {
            let slot = slot_index(path);
            self.mem.lock()[slot] = Some((*digest, bytes.to_vec()));
        } else if depth < self.file_depth && bytes.len() <= RECORD_DATA_SIZE {
            self.file_put(slot_index(path) - slots_for_depth(self.mem_depth), digest, bytes);
        }
    }

    /// Returns a snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, path: &[u8], digest: &Digest) -> Option<Vec<u8>> {
        let depth = path.len() as u32;
        if depth < self.mem_depth {
            let slot = slot_index(path);
            let guard = self.mem.lock();
            return match &guard[slot] {
                Some((cached, bytes)) if cached == digest => Some(bytes.clone()),
                _ => None,
            };
        }
        if depth < self.file_depth {
            return self.file_get(slot_index(path) - slots_for_depth(self.mem_depth), digest);
        }
        None
    }

    fn file_get(&self, record: usize, digest: &Digest) -> Option<Vec<u8>> {
        let guard = self.file.as_ref()?.lock();
        let bytes = &guard[record * RECORD_SIZE..(record + 1) * RECORD_SIZE];
        let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if len == 0 || len > RECORD_DATA_SIZE {
            return None;
        }
        if &bytes[2..2 + HASH_SIZE] != digest {
            return None;
        }
        Some(bytes[2 + HASH_SIZE..2 + HASH_SIZE + len].to_vec())
    }

    fn file_put(&self, record: usize, digest: &Digest, bytes: &[u8]) {
        let Some(file) = self.file.as_ref() else {
            return;
        };
        let mut guard = file.lock();
        let slot = &mut guard[record * RECORD_SIZE..(record + 1) * RECORD_SIZE];
        slot[..2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
        slot[2..2 + HASH_SIZE].copy_from_slice(digest);
        slot[2 + HASH_SIZE..2 + HASH_SIZE + bytes.len()].copy_from_slice(bytes);
    }
}
