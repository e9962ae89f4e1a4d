//! Value capability for trie payloads.

use super::trie::Result;

/// Capability a trie payload must provide.
///
/// Values serialize to a canonical byte form for node encoding, rebuild
/// from stored bytes, and may carry a side-effect that runs the first time
/// the node holding them is committed. Equality drives the idempotent-set
/// check: writing an equal value at an occupied position is a no-op.
pub trait TrieValue: Clone + PartialEq + std::fmt::Debug {
    /// Canonical byte encoding embedded in the owning node's encoding.
    fn to_bytes(&self) -> Vec<u8>;

    /// Rebuilds a value from stored bytes.
    ///
    /// `None` means the bytes do not satisfy this value's schema, which
    /// surfaces as an unrecoverable mismatch at decode time.
    fn from_bytes(bytes: &[u8]) -> Option<Self>;

    /// Runs once when the node holding this value is first committed.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Opaque byte payloads are stored as-is.
impl TrieValue for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}
