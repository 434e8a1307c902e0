//! Protocol layer: wire format, frames, frame buffering, message types.

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use message::{
    AddRigidBodyPrimitive, DeformableMeshes, FinishAnimation, Meshes, MeshesChunk, Message, Pose,
    UpdateRigidBodyPose, CHUNK_SIZE, IDENTITY_POSE, WRAPPED_DEFORMABLE_PREFIX,
};
pub use wire_format::{
    decode_length, encode_length, tag_name, tags, validate_tag, DEFAULT_MAX_PAYLOAD_SIZE,
    LENGTH_PREFIX_SIZE,
};
