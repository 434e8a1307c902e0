//! Wire format constants and the frame length prefix.
//!
//! A frame on the wire is:
//! ```text
//! ┌──────────┬───────┬────────────────┐
//! │ Length   │ Tag   │ Body           │
//! │ 4 bytes  │ 1 byte│ Length-1 bytes │
//! │ uint32 BE│       │ msgpack map    │
//! └──────────┴───────┴────────────────┘
//! ```
//!
//! `Length` counts every byte after the length field (tag + body), so
//! message boundaries survive arbitrary TCP segmentation/coalescing.

use crate::error::{Result, ScenewireError};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Message tag constants. One stable byte per variant, used for both wire
/// dispatch and handler dispatch.
pub mod tags {
    /// Rigid-body static geometry (possibly a chunk announcement).
    pub const MESHES: u8 = 1;
    /// Fragment of a chunked mesh payload.
    pub const MESHES_CHUNK: u8 = 2;
    /// Full per-frame geometry for a deformable object.
    pub const DEFORMABLE_MESHES: u8 = 3;
    /// Pose-only update for a rigid body.
    pub const UPDATE_RIGID_BODY_POSE: u8 = 4;
    /// RPC-style creation of a canned shape.
    pub const ADD_RIGID_BODY_PRIMITIVE: u8 = 5;
    /// Terminal message for the session.
    pub const FINISH_ANIMATION: u8 = 6;
}

/// Human-readable name for a tag, for diagnostics.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        tags::MESHES => "Meshes",
        tags::MESHES_CHUNK => "MeshesChunk",
        tags::DEFORMABLE_MESHES => "DeformableMeshes",
        tags::UPDATE_RIGID_BODY_POSE => "UpdateRigidBodyPose",
        tags::ADD_RIGID_BODY_PRIMITIVE => "AddRigidBodyPrimitive",
        tags::FINISH_ANIMATION => "FinishAnimation",
        _ => "Unknown",
    }
}

/// Check that a tag names a known message variant.
pub fn validate_tag(tag: u8) -> Result<()> {
    match tag {
        tags::MESHES
        | tags::MESHES_CHUNK
        | tags::DEFORMABLE_MESHES
        | tags::UPDATE_RIGID_BODY_POSE
        | tags::ADD_RIGID_BODY_PRIMITIVE
        | tags::FINISH_ANIMATION => Ok(()),
        other => Err(ScenewireError::UnknownTag(other)),
    }
}

/// Encode a frame length prefix (Big Endian).
#[inline]
pub fn encode_length(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a frame length prefix from the start of `buf`.
///
/// Returns `None` if the buffer holds fewer than 4 bytes.
#[inline]
pub fn decode_length(buf: &[u8]) -> Option<u32> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}
