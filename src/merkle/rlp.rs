//! RLP (Recursive Length Prefix) encoding and decoding.
//!
//! RLP is the length-prefixed binary format trie nodes are serialized with
//! before hashing and storage. Encoding builds into an owned buffer;
//! decoding works on borrowed slices and distinguishes truncated input
//! (`NotEnoughBytes`) from malformed input (`InvalidEncoding`).

use thiserror::Error;

/// Decoding failure.
///
/// `NotEnoughBytes` means the input stops before the item ends and a caller
/// holding a stream may retry with more data. `InvalidEncoding` means the
/// bytes can never decode and must be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RlpError {
    #[error("input ends before the item does")]
    NotEnoughBytes,
    #[error("malformed or non-minimal encoding")]
    InvalidEncoding,
}

/// RLP encoder for building RLP-encoded data.
#[derive(Clone, Debug)]
pub struct RlpEncoder {
    buffer: Vec<u8>,
}

impl RlpEncoder {
    /// Creates a new empty encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates an encoder with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Clears the encoder.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Encodes a byte slice as a string.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            self.buffer.push(bytes[0]);
        } else if bytes.len() < 56 {
            self.buffer.push(0x80 + bytes.len() as u8);
            self.buffer.extend_from_slice(bytes);
        } else {
            let len_bytes = encode_length(bytes.len());
            self.buffer.push(0xb7 + len_bytes.len() as u8);
            self.buffer.extend_from_slice(&len_bytes);
            self.buffer.extend_from_slice(bytes);
        }
    }

    /// Encodes an empty string.
    pub fn encode_empty(&mut self) {
        self.buffer.push(0x80);
    }

    /// Appends an already-encoded item verbatim.
    ///
    /// Used to embed a child node's full encoding inside its parent's list
    /// when the child is below the inlining threshold.
    pub fn encode_raw(&mut self, encoded: &[u8]) {
        self.buffer.extend_from_slice(encoded);
    }

    /// Starts encoding a list, returns the position to write length later.
    pub fn start_list(&mut self) -> usize {
        let pos = self.buffer.len();
        // Reserve space for list header (we'll fill it in later)
        self.buffer.push(0); // Placeholder
        pos
    }

    /// Finishes encoding a list started at the given position.
    pub fn finish_list(&mut self, start_pos: usize) {
        let content_len = self.buffer.len() - start_pos - 1;

        if content_len < 56 {
            self.buffer[start_pos] = 0xc0 + content_len as u8;
        } else {
            let len_bytes = encode_length(content_len);
            let header_len = 1 + len_bytes.len();

            // Need to make room for longer header
            let extra = header_len - 1;
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + extra, 0);
            self.buffer
                .copy_within(start_pos + 1..old_len, start_pos + header_len);

            self.buffer[start_pos] = 0xf7 + len_bytes.len() as u8;
            self.buffer[start_pos + 1..start_pos + header_len].copy_from_slice(&len_bytes);
        }
    }

    /// Encodes a list of items.
    pub fn encode_list<F>(&mut self, encode_items: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.start_list();
        encode_items(self);
        self.finish_list(start);
    }

    /// Encodes a u64 value.
    pub fn encode_u64(&mut self, value: u64) {
        if value == 0 {
            self.buffer.push(0x80);
        } else if value < 0x80 {
            self.buffer.push(value as u8);
        } else {
            let bytes = encode_length(value as usize);
            self.encode_bytes(&bytes);
        }
    }

    /// Encodes compact nibbles (for leaf/extension nodes).
    ///
    /// HP (Hex-Prefix) encoding:
    /// - First nibble: flags (0=extension even, 1=extension odd, 2=leaf even, 3=leaf odd)
    /// - Remaining nibbles: path
    pub fn encode_nibbles(&mut self, nibbles: &[u8], is_leaf: bool) {
        let odd = nibbles.len() % 2 == 1;
        let prefix = if is_leaf {
            if odd {
                0x3
            } else {
                0x2
            }
        } else if odd {
            0x1
        } else {
            0x0
        };

        let mut encoded = Vec::with_capacity((nibbles.len() + 2) / 2);

        if odd {
            // Odd: combine prefix with first nibble
            encoded.push((prefix << 4) | nibbles[0]);
            for chunk in nibbles[1..].chunks(2) {
                encoded.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        } else {
            // Even: prefix byte then nibbles
            encoded.push(prefix << 4);
            for chunk in nibbles.chunks(2) {
                encoded.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        }

        self.encode_bytes(&encoded);
    }
}

impl Default for RlpEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a length as big-endian bytes without leading zeros.
fn encode_length(len: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut n = len;

    if n == 0 {
        return vec![0];
    }

    while n > 0 {
        bytes.push((n & 0xff) as u8);
        n >>= 8;
    }

    bytes.reverse();
    bytes
}

/// Reads the length header of the item starting at `bytes[0]`.
///
/// Returns `(tag_size, content_size)`: the item occupies
/// `tag_size + content_size` bytes, with the content following the tag.
/// A single byte below 0x80 is its own content (`tag_size == 0`).
///
/// Rejects non-minimal forms: a multi-byte length below 56, a multi-byte
/// length with a leading zero byte, and a 1-byte string whose content byte
/// is below 0x80.
pub fn read_length_header(bytes: &[u8]) -> Result<(usize, usize), RlpError> {
    let tag = *bytes.first().ok_or(RlpError::NotEnoughBytes)?;

    let (tag_size, content_size) = match tag {
        0x00..=0x7f => (0, 1),
        0x80..=0xb7 => {
            let size = (tag - 0x80) as usize;
            if size == 1 {
                match bytes.get(1) {
                    None => return Err(RlpError::NotEnoughBytes),
                    // A single byte below 0x80 must encode as itself.
                    Some(content) if *content < 0x80 => return Err(RlpError::InvalidEncoding),
                    Some(_) => {}
                }
            }
            (1, size)
        }
        0xb8..=0xbf => {
            let len_of_len = (tag - 0xb7) as usize;
            (1 + len_of_len, read_size(bytes, len_of_len)?)
        }
        0xc0..=0xf7 => (1, (tag - 0xc0) as usize),
        0xf8..=0xff => {
            let len_of_len = (tag - 0xf7) as usize;
            (1 + len_of_len, read_size(bytes, len_of_len)?)
        }
    };

    if bytes.len() < tag_size + content_size {
        return Err(RlpError::NotEnoughBytes);
    }
    Ok((tag_size, content_size))
}

/// Reads a multi-byte big-endian length following the tag byte.
fn read_size(bytes: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    if bytes.len() < 1 + len_of_len {
        return Err(RlpError::NotEnoughBytes);
    }
    let len_bytes = &bytes[1..1 + len_of_len];
    if len_bytes[0] == 0 {
        return Err(RlpError::InvalidEncoding);
    }
    let mut size: usize = 0;
    for byte in len_bytes {
        size = size
            .checked_mul(256)
            .and_then(|s| s.checked_add(*byte as usize))
            .ok_or(RlpError::InvalidEncoding)?;
    }
    // Lengths below 56 fit in the short form.
    if size < 56 {
        return Err(RlpError::InvalidEncoding);
    }
    Ok(size)
}

/// Returns true if the item starting at `bytes[0]` is a list.
#[inline]
pub fn is_list(bytes: &[u8]) -> bool {
    matches!(bytes.first(), Some(tag) if *tag >= 0xc0)
}

/// Decodes a string item, returning its content bytes.
///
/// The slice must contain exactly one item with nothing after it.
pub fn decode_bytes(bytes: &[u8]) -> Result<&[u8], RlpError> {
    if is_list(bytes) {
        return Err(RlpError::InvalidEncoding);
    }
    let (tag_size, content_size) = read_length_header(bytes)?;
    if bytes.len() != tag_size + content_size {
        return Err(RlpError::InvalidEncoding);
    }
    Ok(&bytes[tag_size..])
}

/// Splits a list encoding into its items.
///
/// Each returned slice is a complete item including its own header, so
/// nested lists can be decoded recursively. The input must contain exactly
/// one list with nothing after it.
pub fn decode_list(bytes: &[u8]) -> Result<Vec<&[u8]>, RlpError> {
    if !is_list(bytes) {
        return Err(RlpError::InvalidEncoding);
    }
    let (tag_size, content_size) = read_length_header(bytes)?;
    if bytes.len() != tag_size + content_size {
        return Err(RlpError::InvalidEncoding);
    }

    let mut items = Vec::new();
    let mut content = &bytes[tag_size..];
    while !content.is_empty() {
        let (item_tag, item_content) = read_length_header(content)?;
        let item_size = item_tag + item_content;
        items.push(&content[..item_size]);
        content = &content[item_size..];
    }
    Ok(items)
}

/// Decodes a hex-prefix path, returning the nibbles and the leaf flag.
///
/// `bytes` is the content of the path string, not its RLP wrapper. The tag
/// nibble must be one of the four defined values and even-parity paths must
/// carry a zero padding nibble.
pub fn decode_nibbles(bytes: &[u8]) -> Result<(Vec<u8>, bool), RlpError> {
    let first = *bytes.first().ok_or(RlpError::InvalidEncoding)?;
    let tag = first >> 4;
    if tag > 0x3 {
        return Err(RlpError::InvalidEncoding);
    }
    let is_leaf = tag & 0x2 != 0;
    let odd = tag & 0x1 != 0;

    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    if odd {
        nibbles.push(first & 0x0F);
    } else if first & 0x0F != 0 {
        return Err(RlpError::InvalidEncoding);
    }
    for byte in &bytes[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    Ok((nibbles, is_leaf))
}
