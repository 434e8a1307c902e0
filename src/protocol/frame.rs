//! Frame struct with typed accessors.
//!
//! Represents a complete length-delimited frame: one tag byte plus the
//! msgpack body. Uses `bytes::Bytes` for zero-copy body sharing.

use bytes::Bytes;

use super::wire_format::{encode_length, tag_name, LENGTH_PREFIX_SIZE};

/// A complete protocol frame, stripped of its length prefix.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Message discriminant tag.
    pub tag: u8,
    /// Body bytes (zero-copy via `bytes::Bytes`).
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame from tag and body.
    pub fn new(tag: u8, body: Bytes) -> Self {
        Self { tag, body }
    }

    /// Create a frame from tag and raw bytes (copies data).
    pub fn from_parts(tag: u8, body: &[u8]) -> Self {
        Self {
            tag,
            body: Bytes::copy_from_slice(body),
        }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body length.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Human-readable name of this frame's tag.
    #[inline]
    pub fn tag_name(&self) -> &'static str {
        tag_name(self.tag)
    }
}

/// Build a complete wire frame as a single byte vector.
///
/// Prepends the length prefix (tag byte + body length) and concatenates
/// tag and body into a contiguous buffer.
pub fn build_frame(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + 1 + body.len());
    buf.extend_from_slice(&encode_length(1 + body.len() as u32));
    buf.push(tag);
    buf.extend_from_slice(body);
    buf
}
