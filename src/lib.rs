//! # mptdb
//!
//! An authenticated key-value store built on a Merkle Patricia Trie.
//!
//! ## Architecture
//!
//! The engine keeps a copy-on-write node graph in memory and persists it
//! into a content-addressed store on `flush`:
//!
//! 1. **MerkleTrie** - In-memory trie over lazily resolved nodes
//! 2. **NodeStore** - Content-addressed byte store the trie commits into
//!
//! ## Modules
//!
//! - `data` - Core data structures (NibblePath)
//! - `merkle` - Trie engine, node codec, hashing and proofs
//! - `store` - Node persistence and positional caching

pub mod data;
pub mod merkle;
pub mod store;
