//! Standalone Merkle proofs.
//!
//! A proof carries the node encodings a verifier needs to replay one key
//! lookup against a root hash it already trusts, without the store.

use super::node::{keccak256, Child, Digest, Node, NodeKind, EMPTY_ROOT};
use crate::data::NibblePath;

/// A proof of a key's presence in, or absence from, a trie.
///
/// Produced by [`MerkleTrie::get_proof`](super::MerkleTrie::get_proof).
#[derive(Debug, Clone)]
pub struct Proof {
    /// The key being proved.
    pub key: Vec<u8>,
    /// Canonical value bytes at the key; `None` claims absence.
    pub value: Option<Vec<u8>>,
    /// Node encodings from the root towards the key. Nodes inlined in
    /// their parent are omitted; the root is always carried.
    pub nodes: Vec<Vec<u8>>,
}

impl Proof {
    pub(crate) fn new(key: Vec<u8>, value: Option<Vec<u8>>, nodes: Vec<Vec<u8>>) -> Self {
        Self { key, value, nodes }
    }

    /// Returns true if this is a proof of inclusion (key exists).
    pub fn is_inclusion(&self) -> bool {
        self.value.is_some()
    }

    /// Returns true if this is a proof of non-existence.
    pub fn is_exclusion(&self) -> bool {
        self.value.is_none()
    }

    /// Verifies this proof against a trusted root hash.
    ///
    /// The walk re-decodes every node, checks each consumed encoding
    /// against the digest its parent committed to, and requires the node
    /// list to be exhausted exactly when the lookup terminates. An empty
    /// node list only vouches for the empty trie.
    pub fn verify(&self, root: &Digest) -> bool {
        let path = NibblePath::from_bytes(&self.key);
        let mut nodes = self.nodes.iter();
        let Some(first) = nodes.next() else {
            return self.value.is_none() && *root == EMPTY_ROOT;
        };
        if keccak256(first) != *root {
            return false;
        }
        let Ok(mut node) = Node::<Vec<u8>>::decode(first, None) else {
            return false;
        };

        let mut remaining = path.as_slice();
        loop {
            let next = match node.kind {
                NodeKind::Leaf {
                    path: leaf_path,
                    value,
                } => {
                    return if leaf_path.as_slice() == remaining {
                        self.value.as_deref() == Some(&value[..]) && nodes.next().is_none()
                    } else {
                        self.value.is_none() && nodes.next().is_none()
                    };
                }
                NodeKind::Extension {
                    path: ext_path,
                    child,
                } => {
                    if remaining.len() < ext_path.len()
                        || &remaining[..ext_path.len()] != ext_path.as_slice()
                    {
                        return self.value.is_none() && nodes.next().is_none();
                    }
                    remaining = &remaining[ext_path.len()..];
                    child
                }
                NodeKind::Branch {
                    mut children,
                    value,
                } => {
                    let Some((&nibble, rest)) = remaining.split_first() else {
                        return self.value == value && nodes.next().is_none();
                    };
                    let Some(child) = children[nibble as usize].take() else {
                        return self.value.is_none() && nodes.next().is_none();
                    };
                    remaining = rest;
                    child
                }
            };
            node = match next {
                Child::Node(inline) => *inline,
                Child::Digest(digest) => {
                    let Some(bytes) = nodes.next() else {
                        return false;
                    };
                    if keccak256(bytes) != digest {
                        return false;
                    }
                    let Ok(decoded) = Node::<Vec<u8>>::decode(bytes, None) else {
                        return false;
                    };
                    decoded
                }
            };
        }
    }
}
