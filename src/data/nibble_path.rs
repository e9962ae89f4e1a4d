//! NibblePath - Path representation for trie traversal.
//!
//! A nibble is a half-byte (4 bits), representing values 0-15.
//! Keys are expanded into nibble sequences; trie navigation consumes one
//! nibble per branch level. Nibbles are stored unpacked (one per byte) so
//! the split/merge operations performed during branch collapse are plain
//! vector edits.

/// Represents a path of nibbles for trie navigation.
///
/// Supports slicing, comparison, concatenation, and iteration over nibbles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NibblePath {
    /// One nibble per byte, each in 0..16.
    nibbles: Vec<u8>,
}

impl NibblePath {
    /// Creates a new empty NibblePath.
    pub fn new() -> Self {
        Self {
            nibbles: Vec::new(),
        }
    }

    /// Creates a NibblePath from a byte slice.
    ///
    /// Each byte expands to two nibbles: high nibble (bits 4-7) first,
    /// then low nibble (bits 0-3).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Self { nibbles }
    }

    /// Creates a NibblePath from already-unpacked nibbles.
    ///
    /// Every element must be below 16.
    pub fn from_nibbles(nibbles: Vec<u8>) -> Self {
        debug_assert!(nibbles.iter().all(|n| *n < 16));
        Self { nibbles }
    }

    /// Returns the number of nibbles in the path.
    #[inline]
    pub fn len(&self) -> usize {
        self.nibbles.len()
    }

    /// Returns true if the path is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nibbles.is_empty()
    }

    /// Gets the nibble at the given index.
    ///
    /// # Panics
    /// Panics if index >= len.
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.nibbles[index]
    }

    /// Returns the nibbles as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.nibbles
    }

    /// Returns a slice of this path starting at the given nibble index.
    pub fn slice_from(&self, start: usize) -> Self {
        if start >= self.nibbles.len() {
            return Self::new();
        }
        Self {
            nibbles: self.nibbles[start..].to_vec(),
        }
    }

    /// Returns a slice of the first `count` nibbles.
    pub fn slice_to(&self, count: usize) -> Self {
        if count >= self.nibbles.len() {
            return self.clone();
        }
        Self {
            nibbles: self.nibbles[..count].to_vec(),
        }
    }

    /// Returns the common prefix length with another path.
    pub fn common_prefix_len(&self, other: &Self) -> usize {
        self.nibbles
            .iter()
            .zip(other.nibbles.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Returns a new path with `nibble` prefixed to this one.
    ///
    /// Branch collapse pushes the surviving child's slot index back onto
    /// its path this way.
    pub fn prepend(&self, nibble: u8) -> Self {
        debug_assert!(nibble < 16);
        let mut nibbles = Vec::with_capacity(self.nibbles.len() + 1);
        nibbles.push(nibble);
        nibbles.extend_from_slice(&self.nibbles);
        Self { nibbles }
    }

    /// Returns the concatenation of this path and `other`.
    pub fn join(&self, other: &Self) -> Self {
        let mut nibbles = Vec::with_capacity(self.nibbles.len() + other.nibbles.len());
        nibbles.extend_from_slice(&self.nibbles);
        nibbles.extend_from_slice(&other.nibbles);
        Self { nibbles }
    }

    /// Appends a single nibble in place.
    pub fn push(&mut self, nibble: u8) {
        debug_assert!(nibble < 16);
        self.nibbles.push(nibble);
    }

    /// Packs the path back into bytes, two nibbles per byte.
    ///
    /// The path must contain an even number of nibbles; complete keys
    /// always do since they expand from whole bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(self.nibbles.len() % 2 == 0);
        self.nibbles
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect()
    }

    /// Returns an iterator over the nibbles.
    pub fn iter(&self) -> NibbleIterator<'_> {
        NibbleIterator {
            path: self,
            index: 0,
        }
    }
}

impl Default for NibblePath {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over nibbles in a NibblePath.
pub struct NibbleIterator<'a> {
    path: &'a NibblePath,
    index: usize,
}

impl<'a> Iterator for NibbleIterator<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.path.len() {
            let nibble = self.path.get(self.index);
            self.index += 1;
            Some(nibble)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.path.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for NibbleIterator<'a> {}
