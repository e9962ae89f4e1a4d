//! Merkle Patricia Trie engine.
//!
//! The trie holds an owned, copy-on-write view of the node graph: reads
//! pull nodes out of the backing store on demand, mutations rebuild the
//! touched path in memory, and `flush` persists every node that changed
//! since the last commit. Unchanged subtrees keep their digests and are
//! never re-serialized or re-written.

use std::mem;
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use super::node::{Child, Digest, Node, NodeKind, NodeState, EMPTY_ROOT, HASH_SIZE};
use super::proof::Proof;
use super::rlp::RlpError;
use super::value::TrieValue;
use crate::data::NibblePath;
use crate::store::{MemoryNodeStore, NodeCache, NodeStore, StoreError};

/// Trie errors.
///
/// `Rlp` and `MissingNode` mean the backing store no longer holds a
/// consistent node graph; a trie that surfaced one should be discarded
/// together with its store.
#[derive(Error, Debug)]
pub enum TrieError {
    #[error("rlp decode failed: {0}")]
    Rlp(#[from] RlpError),
    #[error("node {0:02x?} missing from store")]
    MissingNode(Digest),
    #[error("stored value does not match the expected schema")]
    ValueSchema,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, TrieError>;

/// An authenticated key-value map over a content-addressed node store.
///
/// Keys are arbitrary byte strings, split into 4-bit nibbles for
/// navigation. Values go through [`TrieValue`] for their canonical
/// encoding. Every mutation leaves previously committed nodes in the
/// store untouched, so older roots stay readable.
pub struct MerkleTrie<V: TrieValue, S: NodeStore = MemoryNodeStore> {
    store: Arc<S>,
    cache: Option<Arc<NodeCache>>,
    /// Root handle; `None` is the empty trie.
    root: Option<Child<V>>,
}

impl<V: TrieValue> MerkleTrie<V> {
    /// Creates a trie over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryNodeStore::new()))
    }
}

impl<V: TrieValue, S: NodeStore> MerkleTrie<V, S> {
    /// Creates an empty trie on top of `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: None,
            root: None,
        }
    }

    /// Reopens the trie committed under `root_hash`.
    ///
    /// The root node is fetched lazily; passing the hash of a node the
    /// store does not hold surfaces as [`TrieError::MissingNode`] on
    /// first access.
    pub fn from_root(store: Arc<S>, root_hash: Digest) -> Self {
        let root = if root_hash == EMPTY_ROOT {
            None
        } else {
            Some(Child::Digest(root_hash))
        };
        Self {
            store,
            cache: None,
            root,
        }
    }

    /// Attaches a node cache consulted before the store on resolution.
    pub fn with_cache(mut self, cache: Arc<NodeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns true if the trie holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Gets a value by key.
    pub fn get(&self, key: &[u8]) -> Result<Option<V>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let path = NibblePath::from_bytes(key);
        let mut prefix = Vec::with_capacity(path.len());
        self.get_at(root, path.as_slice(), &mut prefix)
    }

    /// Inserts a key-value pair.
    ///
    /// Writing a value whose canonical encoding is empty removes the key
    /// instead, so no stored node ever carries an empty value. Writing a
    /// value equal to the current one is a no-op that dirties nothing.
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<()> {
        if value.to_bytes().is_empty() {
            self.remove(key)?;
            return Ok(());
        }
        let path = NibblePath::from_bytes(key);
        let mut prefix = Vec::with_capacity(path.len());
        let slot = self.root.take();
        let (root, _) = self.insert_at(slot, path.as_slice(), value, &mut prefix)?;
        self.root = Some(root);
        Ok(())
    }

    /// Removes a key, returning its value if it was present.
    ///
    /// Removing an absent key leaves the trie untouched.
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<V>> {
        let Some(root) = self.root.take() else {
            return Ok(None);
        };
        let path = NibblePath::from_bytes(key);
        let mut prefix = Vec::with_capacity(path.len());
        let (root, removed) = self.remove_at(root, path.as_slice(), &mut prefix)?;
        self.root = root;
        Ok(removed)
    }

    /// Computes the root hash of the current contents.
    pub fn root_hash(&mut self) -> Digest {
        match &mut self.root {
            None => EMPTY_ROOT,
            Some(Child::Digest(digest)) => *digest,
            Some(Child::Node(node)) => node.hash(),
        }
    }

    /// Computes the root hash, serializing the root's children in
    /// parallel first. Produces the same digest as [`Self::root_hash`].
    pub fn parallel_root_hash(&mut self) -> Digest
    where
        V: Send + Sync,
    {
        if let Some(Child::Node(node)) = &mut self.root {
            if node.state() == NodeState::Dirty {
                if let NodeKind::Branch { children, .. } = &mut node.kind {
                    children.as_mut_slice().par_iter_mut().for_each(|slot| {
                        if let Some(Child::Node(child)) = slot {
                            child.serialize();
                        }
                    });
                }
            }
        }
        self.root_hash()
    }

    /// Persists every node changed since the last flush and returns the
    /// new root hash.
    ///
    /// Nodes are written bottom-up. Committed subtrees are skipped
    /// entirely; nodes small enough to be inlined in their parent are
    /// committed without a store write of their own. The root is always
    /// written when it changed, inlineable or not, so `from_root` can
    /// find it again.
    pub fn flush(&mut self) -> Result<Digest> {
        let Some(mut root) = self.root.take() else {
            return Ok(EMPTY_ROOT);
        };
        let mut flushed = 0usize;
        let mut prefix = Vec::new();
        let digest = match &mut root {
            Child::Digest(digest) => *digest,
            Child::Node(node) => {
                self.flush_node(node, &mut prefix, true, &mut flushed)?;
                node.hash()
            }
        };
        self.root = Some(root);
        if flushed > 0 {
            debug!("flush wrote {flushed} nodes");
        }
        Ok(digest)
    }

    /// Generates a proof for `key` against the current contents.
    ///
    /// The proof carries the encodings of every node on the lookup path
    /// that is not inlined in its parent, root first. Absent keys yield
    /// an exclusion proof over the same path.
    pub fn get_proof(&mut self, key: &[u8]) -> Result<Proof> {
        let path = NibblePath::from_bytes(key);
        let mut nodes = Vec::new();
        let value = match self.root.take() {
            None => None,
            Some(root) => {
                let mut prefix = Vec::with_capacity(path.len());
                let (root, value) =
                    self.prove_at(root, path.as_slice(), &mut nodes, &mut prefix, true)?;
                self.root = Some(root);
                value
            }
        };
        Ok(Proof::new(key.to_vec(), value, nodes))
    }

    /// Visits every entry in key order.
    pub fn for_each<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&[u8], &V),
    {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let mut prefix = Vec::new();
        self.visit_at(root, &mut prefix, &mut visitor)
    }

    /// Collects every entry in key order.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, V)>> {
        let mut entries = Vec::new();
        self.for_each(|key, value| entries.push((key.to_vec(), value.clone())))?;
        Ok(entries)
    }

    /// Pulls a node from the cache or store by digest. `prefix` is the
    /// nibble path from the root, used as the cache coordinate.
    fn resolve(&self, digest: &Digest, prefix: &[u8]) -> Result<Node<V>> {
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(prefix, digest) {
                return Node::decode(&bytes, Some(*digest));
            }
        }
        let bytes = self
            .store
            .get(digest)?
            .ok_or(TrieError::MissingNode(*digest))?;
        if let Some(cache) = &self.cache {
            cache.put(prefix, digest, &bytes);
        }
        Node::decode(&bytes, Some(*digest))
    }

    fn get_at(&self, child: &Child<V>, remaining: &[u8], prefix: &mut Vec<u8>) -> Result<Option<V>> {
        let resolved;
        let node = match child {
            Child::Node(node) => node.as_ref(),
            Child::Digest(digest) => {
                resolved = self.resolve(digest, prefix)?;
                &resolved
            }
        };
        match &node.kind {
            NodeKind::Leaf { path, value } => {
                if path.as_slice() == remaining {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }
            NodeKind::Extension { path, child } => {
                if remaining.len() < path.len() || &remaining[..path.len()] != path.as_slice() {
                    return Ok(None);
                }
                prefix.extend_from_slice(path.as_slice());
                let found = self.get_at(child, &remaining[path.len()..], prefix)?;
                prefix.truncate(prefix.len() - path.len());
                Ok(found)
            }
            NodeKind::Branch { children, value } => {
                let Some((&nibble, rest)) = remaining.split_first() else {
                    return Ok(value.clone());
                };
                let Some(child) = &children[nibble as usize] else {
                    return Ok(None);
                };
                prefix.push(nibble);
                let found = self.get_at(child, rest, prefix)?;
                prefix.pop();
                Ok(found)
            }
        }
    }

    /// Inserts `value` below `slot`, returning the rebuilt child and
    /// whether anything actually changed.
    fn insert_at(
        &self,
        slot: Option<Child<V>>,
        remaining: &[u8],
        value: V,
        prefix: &mut Vec<u8>,
    ) -> Result<(Child<V>, bool)> {
        let Some(child) = slot else {
            let leaf = Node::leaf(NibblePath::from_nibbles(remaining.to_vec()), value);
            return Ok((Child::node(leaf), true));
        };
        let mut node = match child {
            Child::Node(node) => node,
            Child::Digest(digest) => Box::new(self.resolve(&digest, prefix)?),
        };

        // An equal write at the exact position leaves the node alone, so
        // committed subtrees stay committed.
        match &node.kind {
            NodeKind::Leaf {
                path,
                value: existing,
            } if path.as_slice() == remaining && *existing == value => {
                return Ok((Child::Node(node), false));
            }
            NodeKind::Branch {
                value: Some(existing),
                ..
            } if remaining.is_empty() && *existing == value => {
                return Ok((Child::Node(node), false));
            }
            _ => {}
        }

        let kind = mem::replace(&mut node.kind, NodeKind::empty_branch());
        let (kind, changed) = match kind {
            NodeKind::Leaf {
                path,
                value: existing,
            } => insert_at_leaf(path, existing, remaining, value),
            NodeKind::Extension { path, child } => {
                self.insert_at_extension(path, child, remaining, value, prefix)?
            }
            NodeKind::Branch {
                children,
                value: branch_value,
            } => self.insert_at_branch(children, branch_value, remaining, value, prefix)?,
        };
        node.kind = kind;
        if changed {
            node.mark_dirty();
        }
        Ok((Child::Node(node), changed))
    }

    fn insert_at_extension(
        &self,
        path: NibblePath,
        child: Child<V>,
        remaining: &[u8],
        value: V,
        prefix: &mut Vec<u8>,
    ) -> Result<(NodeKind<V>, bool)> {
        let common = common_prefix_len(path.as_slice(), remaining);
        if common == path.len() {
            // The key runs through this extension entirely.
            prefix.extend_from_slice(path.as_slice());
            let result = self.insert_at(Some(child), &remaining[common..], value, prefix);
            prefix.truncate(prefix.len() - path.len());
            let (child, changed) = result?;
            return Ok((NodeKind::Extension { path, child }, changed));
        }

        // The key diverges inside the extension: split it with a branch
        // at the divergence point.
        let mut children: Box<[Option<Child<V>>; 16]> = Box::new(std::array::from_fn(|_| None));
        let mut branch_value = None;

        let ext_nibble = path.get(common);
        let ext_tail = NibblePath::from_nibbles(path.as_slice()[common + 1..].to_vec());
        children[ext_nibble as usize] = Some(if ext_tail.is_empty() {
            child
        } else {
            Child::node(Node::extension(ext_tail, child))
        });

        if remaining.len() == common {
            branch_value = Some(value);
        } else {
            let nibble = remaining[common];
            let tail = NibblePath::from_nibbles(remaining[common + 1..].to_vec());
            children[nibble as usize] = Some(Child::node(Node::leaf(tail, value)));
        }

        let branch = NodeKind::Branch {
            children,
            value: branch_value,
        };
        if common == 0 {
            Ok((branch, true))
        } else {
            Ok((
                NodeKind::Extension {
                    path: NibblePath::from_nibbles(path.as_slice()[..common].to_vec()),
                    child: Child::node(Node::dirty(branch)),
                },
                true,
            ))
        }
    }

    fn insert_at_branch(
        &self,
        mut children: Box<[Option<Child<V>>; 16]>,
        branch_value: Option<V>,
        remaining: &[u8],
        value: V,
        prefix: &mut Vec<u8>,
    ) -> Result<(NodeKind<V>, bool)> {
        let Some((&nibble, rest)) = remaining.split_first() else {
            // The equal-value case was handled before dispatch.
            return Ok((
                NodeKind::Branch {
                    children,
                    value: Some(value),
                },
                true,
            ));
        };
        let slot = children[nibble as usize].take();
        prefix.push(nibble);
        let result = self.insert_at(slot, rest, value, prefix);
        prefix.pop();
        let (child, changed) = result?;
        children[nibble as usize] = Some(child);
        Ok((
            NodeKind::Branch {
                children,
                value: branch_value,
            },
            changed,
        ))
    }

    /// Removes `remaining` below `child`, returning the rebuilt slot and
    /// the removed value. A miss returns the child with its shape and
    /// states intact.
    fn remove_at(
        &self,
        child: Child<V>,
        remaining: &[u8],
        prefix: &mut Vec<u8>,
    ) -> Result<(Option<Child<V>>, Option<V>)> {
        let mut node = match child {
            Child::Node(node) => node,
            Child::Digest(digest) => Box::new(self.resolve(&digest, prefix)?),
        };

        let kind = mem::replace(&mut node.kind, NodeKind::empty_branch());
        match kind {
            NodeKind::Leaf { path, value } => {
                if path.as_slice() == remaining {
                    return Ok((None, Some(value)));
                }
                node.kind = NodeKind::Leaf { path, value };
                Ok((Some(Child::Node(node)), None))
            }
            NodeKind::Extension { path, child } => {
                if remaining.len() < path.len() || &remaining[..path.len()] != path.as_slice() {
                    node.kind = NodeKind::Extension { path, child };
                    return Ok((Some(Child::Node(node)), None));
                }
                prefix.extend_from_slice(path.as_slice());
                let result = self.remove_at(child, &remaining[path.len()..], prefix);
                prefix.truncate(prefix.len() - path.len());
                let (child_slot, removed) = result?;
                let Some(child) = child_slot else {
                    // Only child gone: the extension goes with it.
                    return Ok((None, removed));
                };
                if removed.is_some() {
                    // The child may have collapsed into a leaf or
                    // extension; absorb it into this node's path.
                    node.kind = absorb_into_extension(path, child);
                    node.mark_dirty();
                } else {
                    node.kind = NodeKind::Extension { path, child };
                }
                Ok((Some(Child::Node(node)), removed))
            }
            NodeKind::Branch {
                mut children,
                value,
            } => {
                let Some((&nibble, rest)) = remaining.split_first() else {
                    // The key ends here; clear the value slot if present.
                    let Some(removed) = value else {
                        node.kind = NodeKind::Branch {
                            children,
                            value: None,
                        };
                        return Ok((Some(Child::Node(node)), None));
                    };
                    return match self.collapse_branch(children, None, prefix)? {
                        Some(kind) => {
                            node.kind = kind;
                            node.mark_dirty();
                            Ok((Some(Child::Node(node)), Some(removed)))
                        }
                        None => Ok((None, Some(removed))),
                    };
                };
                let Some(slot) = children[nibble as usize].take() else {
                    node.kind = NodeKind::Branch { children, value };
                    return Ok((Some(Child::Node(node)), None));
                };
                prefix.push(nibble);
                let result = self.remove_at(slot, rest, prefix);
                prefix.pop();
                let (child_slot, removed) = result?;
                children[nibble as usize] = child_slot;
                if removed.is_none() {
                    node.kind = NodeKind::Branch { children, value };
                    return Ok((Some(Child::Node(node)), None));
                }
                match self.collapse_branch(children, value, prefix)? {
                    Some(kind) => {
                        node.kind = kind;
                        node.mark_dirty();
                        Ok((Some(Child::Node(node)), removed))
                    }
                    None => Ok((None, removed)),
                }
            }
        }
    }

    /// Rebuilds a branch after one of its slots emptied. A branch left
    /// with a single child and no value dissolves into its survivor,
    /// which may have to be resolved to decide the collapsed shape.
    /// Returns `None` when nothing remains at all.
    fn collapse_branch(
        &self,
        mut children: Box<[Option<Child<V>>; 16]>,
        value: Option<V>,
        prefix: &mut Vec<u8>,
    ) -> Result<Option<NodeKind<V>>> {
        let occupied = children.iter().filter(|slot| slot.is_some()).count();
        if occupied >= 2 || (occupied >= 1 && value.is_some()) {
            return Ok(Some(NodeKind::Branch { children, value }));
        }
        if let Some(value) = value {
            // No children left; only the value survives.
            return Ok(Some(NodeKind::Leaf {
                path: NibblePath::new(),
                value,
            }));
        }
        let Some((index, child)) = children
            .iter_mut()
            .enumerate()
            .find_map(|(index, slot)| slot.take().map(|child| (index, child)))
        else {
            return Ok(None);
        };
        let nibble = index as u8;

        prefix.push(nibble);
        let resolved = match child {
            Child::Node(node) => node,
            Child::Digest(digest) => Box::new(self.resolve(&digest, prefix)?),
        };
        prefix.pop();

        let mut survivor = resolved;
        let kind = match mem::replace(&mut survivor.kind, NodeKind::empty_branch()) {
            NodeKind::Leaf { path, value } => NodeKind::Leaf {
                path: path.prepend(nibble),
                value,
            },
            NodeKind::Extension { path, child } => NodeKind::Extension {
                path: path.prepend(nibble),
                child,
            },
            kind @ NodeKind::Branch { .. } => {
                survivor.kind = kind;
                NodeKind::Extension {
                    path: NibblePath::from_nibbles(vec![nibble]),
                    child: Child::Node(survivor),
                }
            }
        };
        Ok(Some(kind))
    }

    fn flush_node(
        &self,
        node: &mut Node<V>,
        prefix: &mut Vec<u8>,
        is_root: bool,
        flushed: &mut usize,
    ) -> Result<()> {
        if node.state() == NodeState::Committed {
            return Ok(());
        }
        match &mut node.kind {
            NodeKind::Leaf { value, .. } => value.flush()?,
            NodeKind::Extension { path, child } => {
                if let Child::Node(child) = child {
                    prefix.extend_from_slice(path.as_slice());
                    let result = self.flush_node(child, prefix, false, flushed);
                    prefix.truncate(prefix.len() - path.len());
                    result?;
                }
            }
            NodeKind::Branch { children, value } => {
                for (index, slot) in children.iter_mut().enumerate() {
                    if let Some(Child::Node(child)) = slot {
                        prefix.push(index as u8);
                        let result = self.flush_node(child, prefix, false, flushed);
                        prefix.pop();
                        result?;
                    }
                }
                if let Some(value) = value {
                    value.flush()?;
                }
            }
        }
        let inlined = node.serialize().len() < HASH_SIZE;
        if is_root || !inlined {
            let digest = node.hash();
            self.store.put(&digest, node.serialize())?;
            if let Some(cache) = &self.cache {
                cache.put(prefix, &digest, node.serialize());
            }
            *flushed += 1;
        }
        node.mark_committed();
        Ok(())
    }

    /// Walks towards `key`, recording node encodings along the way.
    /// Nothing is dirtied; resolved nodes stay materialized.
    fn prove_at(
        &self,
        child: Child<V>,
        remaining: &[u8],
        nodes: &mut Vec<Vec<u8>>,
        prefix: &mut Vec<u8>,
        is_root: bool,
    ) -> Result<(Child<V>, Option<Vec<u8>>)> {
        let mut node = match child {
            Child::Node(node) => node,
            Child::Digest(digest) => Box::new(self.resolve(&digest, prefix)?),
        };
        let encoded = node.serialize().to_vec();
        // Inlined nodes travel embedded in their parent's encoding; the
        // root has no parent and is always carried.
        if is_root || encoded.len() >= HASH_SIZE {
            nodes.push(encoded);
        }

        let kind = mem::replace(&mut node.kind, NodeKind::empty_branch());
        let (kind, value) = match kind {
            NodeKind::Leaf { path, value } => {
                let found = if path.as_slice() == remaining {
                    Some(value.to_bytes())
                } else {
                    None
                };
                (NodeKind::Leaf { path, value }, found)
            }
            NodeKind::Extension { path, child } => {
                if remaining.len() < path.len() || &remaining[..path.len()] != path.as_slice() {
                    (NodeKind::Extension { path, child }, None)
                } else {
                    prefix.extend_from_slice(path.as_slice());
                    let result =
                        self.prove_at(child, &remaining[path.len()..], nodes, prefix, false);
                    prefix.truncate(prefix.len() - path.len());
                    let (child, found) = result?;
                    (NodeKind::Extension { path, child }, found)
                }
            }
            NodeKind::Branch {
                mut children,
                value,
            } => {
                let found = match remaining.split_first() {
                    None => value.as_ref().map(|value| value.to_bytes()),
                    Some((&nibble, rest)) => match children[nibble as usize].take() {
                        None => None,
                        Some(slot) => {
                            prefix.push(nibble);
                            let result = self.prove_at(slot, rest, nodes, prefix, false);
                            prefix.pop();
                            let (child, found) = result?;
                            children[nibble as usize] = Some(child);
                            found
                        }
                    },
                };
                (NodeKind::Branch { children, value }, found)
            }
        };
        node.kind = kind;
        Ok((Child::Node(node), value))
    }

    fn visit_at<F>(&self, child: &Child<V>, prefix: &mut Vec<u8>, visitor: &mut F) -> Result<()>
    where
        F: FnMut(&[u8], &V),
    {
        let resolved;
        let node = match child {
            Child::Node(node) => node.as_ref(),
            Child::Digest(digest) => {
                resolved = self.resolve(digest, prefix)?;
                &resolved
            }
        };
        match &node.kind {
            NodeKind::Leaf { path, value } => {
                let mut nibbles = prefix.clone();
                nibbles.extend_from_slice(path.as_slice());
                let key = NibblePath::from_nibbles(nibbles).to_bytes();
                visitor(&key, value);
            }
            NodeKind::Extension { path, child } => {
                prefix.extend_from_slice(path.as_slice());
                let result = self.visit_at(child, prefix, visitor);
                prefix.truncate(prefix.len() - path.len());
                result?;
            }
            NodeKind::Branch { children, value } => {
                if let Some(value) = value {
                    let key = NibblePath::from_nibbles(prefix.clone()).to_bytes();
                    visitor(&key, value);
                }
                for (index, slot) in children.iter().enumerate() {
                    if let Some(child) = slot {
                        prefix.push(index as u8);
                        let result = self.visit_at(child, prefix, visitor);
                        prefix.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Splits a leaf so that both its entry and the new one fit, or
/// overwrites in place when the paths match exactly.
fn insert_at_leaf<V: TrieValue>(
    path: NibblePath,
    existing: V,
    remaining: &[u8],
    value: V,
) -> (NodeKind<V>, bool) {
    if path.as_slice() == remaining {
        // The equal-value case was handled before dispatch.
        return (NodeKind::Leaf { path, value }, true);
    }
    let common = common_prefix_len(path.as_slice(), remaining);
    let mut children: Box<[Option<Child<V>>; 16]> = Box::new(std::array::from_fn(|_| None));
    let mut branch_value = None;

    if path.len() == common {
        branch_value = Some(existing);
    } else {
        let nibble = path.get(common);
        let tail = NibblePath::from_nibbles(path.as_slice()[common + 1..].to_vec());
        children[nibble as usize] = Some(Child::node(Node::leaf(tail, existing)));
    }
    if remaining.len() == common {
        branch_value = Some(value);
    } else {
        let nibble = remaining[common];
        let tail = NibblePath::from_nibbles(remaining[common + 1..].to_vec());
        children[nibble as usize] = Some(Child::node(Node::leaf(tail, value)));
    }

    let branch = NodeKind::Branch {
        children,
        value: branch_value,
    };
    if common == 0 {
        (branch, true)
    } else {
        (
            NodeKind::Extension {
                path: NibblePath::from_nibbles(remaining[..common].to_vec()),
                child: Child::node(Node::dirty(branch)),
            },
            true,
        )
    }
}

/// Reattaches an extension's child after a removal below it. A child
/// that collapsed into a leaf or extension merges into this node's path.
fn absorb_into_extension<V: TrieValue>(path: NibblePath, child: Child<V>) -> NodeKind<V> {
    let mut node = match child {
        Child::Node(node) => node,
        child @ Child::Digest(_) => return NodeKind::Extension { path, child },
    };
    match mem::replace(&mut node.kind, NodeKind::empty_branch()) {
        NodeKind::Leaf { path: tail, value } => NodeKind::Leaf {
            path: path.join(&tail),
            value,
        },
        NodeKind::Extension { path: tail, child } => NodeKind::Extension {
            path: path.join(&tail),
            child,
        },
        kind @ NodeKind::Branch { .. } => {
            node.kind = kind;
            NodeKind::Extension {
                path,
                child: Child::Node(node),
            }
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
