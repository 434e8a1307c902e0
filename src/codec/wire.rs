//! Wire codec: `Message` ⇄ frame bytes.
//!
//! Encoding builds a complete frame (`[len][tag][msgpack body]`); decoding
//! takes a [`Frame`] extracted by the
//! [`FrameBuffer`](crate::protocol::FrameBuffer) and matches its tag
//! exhaustively. Both error classes here, `UnknownTag` and
//! `MalformedFrame`, are permanently fatal to the connection: after a
//! corrupt frame the stream can no longer be trusted to contain aligned
//! frames.

use crate::error::{Result, ScenewireError};
use crate::protocol::{build_frame, tag_name, tags, Frame, Message};

use super::MsgPackCodec;

/// Codec pairing each message variant with its wire tag.
pub struct WireCodec;

impl WireCodec {
    /// Encode a message into complete frame bytes, length prefix included.
    pub fn encode(message: &Message) -> Result<Vec<u8>> {
        let body = match message {
            Message::Meshes(m) => MsgPackCodec::encode(m)?,
            Message::MeshesChunk(m) => MsgPackCodec::encode(m)?,
            Message::DeformableMeshes(m) => MsgPackCodec::encode(m)?,
            Message::UpdateRigidBodyPose(m) => MsgPackCodec::encode(m)?,
            Message::AddRigidBodyPrimitive(m) => MsgPackCodec::encode(m)?,
            Message::FinishAnimation(m) => MsgPackCodec::encode(m)?,
        };
        Ok(build_frame(message.tag(), &body))
    }

    /// Decode a frame into a message.
    ///
    /// # Errors
    ///
    /// - `UnknownTag` if the discriminant matches no known variant.
    /// - `MalformedFrame` if the body does not decode as the tag's struct.
    pub fn decode(frame: &Frame) -> Result<Message> {
        let body = frame.body();
        match frame.tag {
            tags::MESHES => Ok(Message::Meshes(decode_body(frame.tag, body)?)),
            tags::MESHES_CHUNK => Ok(Message::MeshesChunk(decode_body(frame.tag, body)?)),
            tags::DEFORMABLE_MESHES => Ok(Message::DeformableMeshes(decode_body(frame.tag, body)?)),
            tags::UPDATE_RIGID_BODY_POSE => {
                Ok(Message::UpdateRigidBodyPose(decode_body(frame.tag, body)?))
            }
            tags::ADD_RIGID_BODY_PRIMITIVE => {
                Ok(Message::AddRigidBodyPrimitive(decode_body(frame.tag, body)?))
            }
            tags::FINISH_ANIMATION => Ok(Message::FinishAnimation(decode_body(frame.tag, body)?)),
            other => Err(ScenewireError::UnknownTag(other)),
        }
    }
}

/// Decode a frame body, mapping rmp errors to `MalformedFrame` with the
/// tag attached for diagnostics.
fn decode_body<T: serde::de::DeserializeOwned>(tag: u8, body: &[u8]) -> Result<T> {
    MsgPackCodec::decode(body).map_err(|e| {
        ScenewireError::MalformedFrame(format!("{} body did not decode: {}", tag_name(tag), e))
    })
}
