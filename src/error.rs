//! Error types for scenewire.

use thiserror::Error;

/// Main error type for all scenewire operations.
///
/// Everything in here is fatal to its connection. Lifecycle violations are
/// deliberately *not* errors; they are surfaced as
/// [`Rejection`](crate::lifecycle::Rejection) events and the connection
/// stays open.
#[derive(Debug, Error)]
pub enum ScenewireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// Frame length header inconsistent with the frame actually received,
    /// or a frame body that does not decode as its tag's variant.
    ///
    /// After this, frame boundaries in the byte stream can no longer be
    /// trusted.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame discriminant does not match any known message variant.
    #[error("unknown message tag: {0}")]
    UnknownTag(u8),

    /// A chunk id at or past the announced chunk count. Indicates a
    /// corrupted chunk-count announcement.
    #[error("chunk id {chunk_id} out of range for \"{mesh_name}\" (chunk_num = {chunk_num})")]
    ChunkOutOfRange {
        mesh_name: String,
        chunk_id: u32,
        chunk_num: u32,
    },

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using ScenewireError.
pub type Result<T> = std::result::Result<T, ScenewireError>;
