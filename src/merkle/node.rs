//! Merkle trie node types.
//!
//! A node pairs its structural payload (`NodeKind`) with a persistence
//! lifecycle and memoized encoding/digest caches. Children are explicit
//! handles: either an owned in-memory node or a digest resolved through
//! the store on first access.

use tiny_keccak::{Hasher, Keccak};

use super::rlp::{self, RlpEncoder, RlpError};
use super::trie::TrieError;
use super::value::TrieValue;
use crate::data::NibblePath;

/// Hash size (Keccak-256).
pub const HASH_SIZE: usize = 32;

/// Digest addressing a node's canonical encoding.
pub type Digest = [u8; HASH_SIZE];

/// Persistence lifecycle of a node.
///
/// The cached encoding and digest are valid exactly when the state is not
/// `Dirty`; any mutation moves the node back to `Dirty`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Value or children changed since the last serialization.
    Dirty,
    /// Encoding and digest are current but not yet persisted.
    Serialized,
    /// Persisted in the store; decoded nodes start here.
    Committed,
}

/// Handle to a child node.
#[derive(Clone, Debug)]
pub enum Child<V: TrieValue> {
    /// Owned, materialized subtree.
    Node(Box<Node<V>>),
    /// Digest of a node that has not been pulled from the store yet.
    Digest(Digest),
}

impl<V: TrieValue> Child<V> {
    /// Wraps an owned node.
    pub fn node(node: Node<V>) -> Self {
        Child::Node(Box::new(node))
    }

    /// Writes this child into the parent's list: encodings below the
    /// inlining threshold are embedded verbatim, everything else
    /// contributes its digest.
    fn encode_into(&mut self, encoder: &mut RlpEncoder) {
        match self {
            Child::Digest(digest) => encoder.encode_bytes(&digest[..]),
            Child::Node(node) => {
                if node.serialize().len() < HASH_SIZE {
                    encoder.encode_raw(node.serialize());
                } else {
                    encoder.encode_bytes(&node.hash());
                }
            }
        }
    }
}

/// Structural payload of a node.
#[derive(Clone, Debug)]
pub enum NodeKind<V: TrieValue> {
    /// Remaining key nibbles and the stored value.
    Leaf { path: NibblePath, value: V },
    /// Shared key prefix in front of a single child.
    Extension { path: NibblePath, child: Child<V> },
    /// One child slot per nibble plus a value for keys ending here.
    Branch {
        children: Box<[Option<Child<V>>; 16]>,
        value: Option<V>,
    },
}

impl<V: TrieValue> NodeKind<V> {
    /// Branch with no children and no value.
    pub(crate) fn empty_branch() -> Self {
        NodeKind::Branch {
            children: Box::new(std::array::from_fn(|_| None)),
            value: None,
        }
    }
}

/// A node in the Merkle Patricia Trie.
#[derive(Clone, Debug)]
pub struct Node<V: TrieValue> {
    state: NodeState,
    /// Canonical encoding, cached while the state is not `Dirty`.
    encoded: Option<Vec<u8>>,
    /// Keccak of `encoded`, cached alongside it.
    hash: Option<Digest>,
    pub(crate) kind: NodeKind<V>,
}

impl<V: TrieValue> Node<V> {
    /// Creates a dirty node around `kind`.
    pub(crate) fn dirty(kind: NodeKind<V>) -> Self {
        Self {
            state: NodeState::Dirty,
            encoded: None,
            hash: None,
            kind,
        }
    }

    /// Creates a leaf node.
    pub fn leaf(path: NibblePath, value: V) -> Self {
        Self::dirty(NodeKind::Leaf { path, value })
    }

    /// Creates an extension node.
    pub fn extension(path: NibblePath, child: Child<V>) -> Self {
        Self::dirty(NodeKind::Extension { path, child })
    }

    /// Creates an empty branch node.
    pub fn branch() -> Self {
        Self::dirty(NodeKind::empty_branch())
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Marks the node dirty, invalidating the cached encoding and digest.
    pub fn mark_dirty(&mut self) {
        self.state = NodeState::Dirty;
        self.encoded = None;
        self.hash = None;
    }

    /// Moves a serialized node to `Committed` once its bytes are persisted.
    pub(crate) fn mark_committed(&mut self) {
        if self.state == NodeState::Serialized {
            self.state = NodeState::Committed;
        }
    }

    /// Returns the canonical encoding, recomputing it if the node is dirty.
    ///
    /// A dirty node moves to `Serialized`. Owned children below the
    /// inlining threshold are embedded in the returned bytes; larger ones
    /// contribute their digest.
    pub fn serialize(&mut self) -> &[u8] {
        if self.state == NodeState::Dirty {
            self.encoded = None;
            self.hash = None;
        }
        if self.encoded.is_none() {
            let bytes = self.encode_kind();
            self.encoded = Some(bytes);
            if self.state == NodeState::Dirty {
                self.state = NodeState::Serialized;
            }
        }
        self.encoded.as_deref().unwrap_or_default()
    }

    /// Keccak digest of the canonical encoding, memoized with it.
    pub fn hash(&mut self) -> Digest {
        self.serialize();
        match self.hash {
            Some(digest) => digest,
            None => {
                let digest = keccak256(self.encoded.as_deref().unwrap_or_default());
                self.hash = Some(digest);
                digest
            }
        }
    }

    fn encode_kind(&mut self) -> Vec<u8> {
        let mut encoder = RlpEncoder::new();
        match &mut self.kind {
            NodeKind::Leaf { path, value } => {
                let value_bytes = value.to_bytes();
                encoder.encode_list(|e| {
                    e.encode_nibbles(path.as_slice(), true);
                    e.encode_bytes(&value_bytes);
                });
            }
            NodeKind::Extension { path, child } => {
                encoder.encode_list(|e| {
                    e.encode_nibbles(path.as_slice(), false);
                    child.encode_into(e);
                });
            }
            NodeKind::Branch { children, value } => {
                let value_bytes = value.as_ref().map(|v| v.to_bytes());
                encoder.encode_list(|e| {
                    for slot in children.iter_mut() {
                        match slot {
                            Some(child) => child.encode_into(e),
                            None => e.encode_empty(),
                        }
                    }
                    // The value slot is embedded as-is, never hashed out
                    // of line, whatever its size.
                    match &value_bytes {
                        Some(bytes) => e.encode_bytes(bytes),
                        None => e.encode_empty(),
                    }
                });
            }
        }
        encoder.into_bytes()
    }

    /// Decodes a node from its canonical encoding.
    ///
    /// `digest` records the digest the bytes were fetched under, if any.
    /// Decoded nodes are `Committed` from birth: their caches hold the
    /// input bytes until a mutation dirties them.
    pub fn decode(bytes: &[u8], digest: Option<Digest>) -> Result<Self, TrieError> {
        let items = rlp::decode_list(bytes)?;
        let kind = match items.len() {
            2 => {
                let path_content = rlp::decode_bytes(items[0])?;
                let (nibbles, is_leaf) = rlp::decode_nibbles(path_content)?;
                let path = NibblePath::from_nibbles(nibbles);
                if is_leaf {
                    let value_bytes = rlp::decode_bytes(items[1])?;
                    let value = V::from_bytes(value_bytes).ok_or(TrieError::ValueSchema)?;
                    NodeKind::Leaf { path, value }
                } else {
                    let child = decode_child(items[1])?
                        .ok_or(TrieError::Rlp(RlpError::InvalidEncoding))?;
                    NodeKind::Extension { path, child }
                }
            }
            17 => {
                let mut children: Box<[Option<Child<V>>; 16]> =
                    Box::new(std::array::from_fn(|_| None));
                for (slot, item) in children.iter_mut().zip(&items[..16]) {
                    *slot = decode_child(item)?;
                }
                let value_bytes = rlp::decode_bytes(items[16])?;
                let value = if value_bytes.is_empty() {
                    None
                } else {
                    Some(V::from_bytes(value_bytes).ok_or(TrieError::ValueSchema)?)
                };
                NodeKind::Branch { children, value }
            }
            _ => return Err(TrieError::Rlp(RlpError::InvalidEncoding)),
        };
        Ok(Self {
            state: NodeState::Committed,
            encoded: Some(bytes.to_vec()),
            hash: digest,
            kind,
        })
    }
}

/// Decodes one branch/extension child slot.
///
/// An empty string is a vacant slot, a 32-byte string is a digest handle,
/// and a nested list is an inlined node decoded in place.
fn decode_child<V: TrieValue>(item: &[u8]) -> Result<Option<Child<V>>, TrieError> {
    if rlp::is_list(item) {
        let node = Node::decode(item, None)?;
        return Ok(Some(Child::node(node)));
    }
    let content = rlp::decode_bytes(item)?;
    match content.len() {
        0 => Ok(None),
        HASH_SIZE => {
            let mut digest = [0u8; HASH_SIZE];
            digest.copy_from_slice(content);
            Ok(Some(Child::Digest(digest)))
        }
        _ => Err(TrieError::Rlp(RlpError::InvalidEncoding)),
    }
}

/// Computes Keccak-256 hash of data.
pub fn keccak256(data: &[u8]) -> Digest {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; HASH_SIZE];
    hasher.finalize(&mut hash);
    hash
}

/// The empty trie root hash (keccak of the RLP empty string).
pub const EMPTY_ROOT: Digest = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
];
