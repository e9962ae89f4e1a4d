//! Authenticated key-value trie.
//!
//! This module implements a Merkle Patricia Trie over a content-addressed
//! node store, including the RLP node codec, Keccak hashing, and
//! standalone proofs.

mod node;
mod proof;
mod rlp;
mod trie;
mod value;


pub use node::{keccak256, Child, Digest, Node, NodeKind, NodeState, EMPTY_ROOT, HASH_SIZE};
pub use proof::Proof;
pub use rlp::{
    decode_bytes, decode_list, decode_nibbles, is_list, read_length_header, RlpEncoder, RlpError,
};
pub use trie::{MerkleTrie, Result, TrieError};
pub use value::TrieValue;
