//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForLength`: need the 4-byte length prefix
//! - `WaitingForPayload`: length parsed, need N more bytes (tag + body)

use bytes::BytesMut;

use super::wire_format::{decode_length, DEFAULT_MAX_PAYLOAD_SIZE, LENGTH_PREFIX_SIZE};
use super::Frame;
use crate::error::{Result, ScenewireError};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the complete length prefix (need 4 bytes).
    WaitingForLength,
    /// Length parsed, waiting for tag + body bytes.
    WaitingForPayload { remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// All data is stored in a single `BytesMut` buffer to minimize
/// allocations; complete frames are split off and frozen.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 1GB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// This is the main API for processing incoming data from the socket.
    /// If data is fragmented, partial data is buffered internally for the
    /// next push.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if a length prefix is zero (a frame must at
    /// least carry its tag byte) or exceeds the configured maximum. Both
    /// mean frame alignment can no longer be trusted.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForLength => {
                let Some(length) = decode_length(&self.buffer) else {
                    return Ok(None);
                };

                if length == 0 {
                    return Err(ScenewireError::MalformedFrame(
                        "zero-length frame carries no tag".to_string(),
                    ));
                }
                if length > self.max_payload_size {
                    return Err(ScenewireError::MalformedFrame(format!(
                        "frame length {} exceeds maximum {}",
                        length, self.max_payload_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::WaitingForPayload { remaining: length };

                // The payload may already be buffered
                self.try_extract_one()
            }

            State::WaitingForPayload { remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let mut payload = self.buffer.split_to(remaining);
                let tag = payload.split_to(1)[0];
                let body = payload.freeze();

                self.state = State::WaitingForLength;

                Ok(Some(Frame::new(tag, body)))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True if the buffer holds a partially received frame.
    ///
    /// Used at EOF to distinguish a clean close from a connection that died
    /// mid-frame.
    pub fn mid_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForPayload { .. })
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
