//! Message types exchanged between engine and renderer.
//!
//! The protocol is a closed tagged union: six variants, each with a stable
//! one-byte discriminant (see [`tags`](super::wire_format::tags)) and a
//! fixed field set. Binary blobs (`mesh_file`, `chunk`) are carried as
//! msgpack bin ranges via `serde_bytes`, never text-escaped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::wire_format::{tag_name, tags};

/// A rigid-body pose: position followed by orientation quaternion,
/// `(x, y, z, qw, qx, qy, qz)`.
pub type Pose = [f64; 7];

/// Identity pose at the origin.
pub const IDENTITY_POSE: Pose = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

/// Default chunk size for splitting large mesh payloads (60 KB).
pub const CHUNK_SIZE: usize = 61440;

/// Reserved `mesh_name` prefix marking a chunked payload that is itself an
/// encoded [`DeformableMeshes`] rather than a mesh file. On reassembly the
/// payload is decoded and the deformable update is delivered instead.
pub const WRAPPED_DEFORMABLE_PREFIX: &str = "deformable::";

/// Rigid-body static geometry, created once at frame 0.
///
/// When `chunk_num > 0` this message is an announcement: `mesh_file` is
/// empty on the wire and the actual bytes follow as [`MeshesChunk`]
/// fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meshes {
    /// Unique object name, typically the mesh file name with extension.
    pub mesh_name: String,
    /// Initial pose of the mesh.
    pub init_pose: Pose,
    /// Number of chunks the file was split into (0 = inline payload).
    pub chunk_num: u32,
    /// Mesh file content. Empty in a chunk announcement.
    #[serde(with = "serde_bytes")]
    pub mesh_file: Vec<u8>,
}

/// Fragment of a chunked [`Meshes`] payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshesChunk {
    /// Name of the mesh this fragment belongs to.
    pub mesh_name: String,
    /// Zero-indexed position of this fragment.
    pub chunk_id: u32,
    /// Fragment bytes.
    #[serde(with = "serde_bytes")]
    pub chunk: Vec<u8>,
}

/// Full geometry for a deformable object at one keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeformableMeshes {
    /// Unique object name.
    pub obj_name: String,
    /// Keyframe index this geometry belongs to.
    pub frame_idx: u64,
    /// Particle positions.
    pub particles: Vec<[f32; 3]>,
    /// Triangle faces as particle index triples.
    pub faces: Vec<[u32; 3]>,
}

/// Pose-only update for a previously created rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRigidBodyPose {
    /// Name of the rigid body.
    pub name: String,
    /// New pose.
    pub pose: Pose,
    /// Keyframe index of the update.
    pub frame_idx: u64,
}

/// RPC-style creation of a canned shape on the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRigidBodyPrimitive {
    /// Unique object name.
    pub primitive_name: String,
    /// Renderer-defined primitive kind (e.g. a builtin cube or sphere).
    pub primitive_type: String,
    /// Keyword parameters forwarded to the renderer's primitive factory.
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Terminal message; no further updates are valid after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishAnimation {
    /// Index of the last frame of the animation.
    pub end_frame_idx: u64,
    /// Experiment name, for the renderer's bookkeeping.
    pub exp_name: String,
}

/// A protocol message: the closed tagged union of everything that can
/// cross the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Meshes(Meshes),
    MeshesChunk(MeshesChunk),
    DeformableMeshes(DeformableMeshes),
    UpdateRigidBodyPose(UpdateRigidBodyPose),
    AddRigidBodyPrimitive(AddRigidBodyPrimitive),
    FinishAnimation(FinishAnimation),
}

impl Message {
    /// Wire discriminant of this message.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Meshes(_) => tags::MESHES,
            Message::MeshesChunk(_) => tags::MESHES_CHUNK,
            Message::DeformableMeshes(_) => tags::DEFORMABLE_MESHES,
            Message::UpdateRigidBodyPose(_) => tags::UPDATE_RIGID_BODY_POSE,
            Message::AddRigidBodyPrimitive(_) => tags::ADD_RIGID_BODY_PRIMITIVE,
            Message::FinishAnimation(_) => tags::FINISH_ANIMATION,
        }
    }

    /// Human-readable variant name, for diagnostics.
    pub fn tag_name(&self) -> &'static str {
        tag_name(self.tag())
    }

    /// The scene-object name this message refers to, if any.
    ///
    /// `FinishAnimation` is session-scoped and has none.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            Message::Meshes(m) => Some(&m.mesh_name),
            Message::MeshesChunk(m) => Some(&m.mesh_name),
            Message::DeformableMeshes(m) => Some(&m.obj_name),
            Message::UpdateRigidBodyPose(m) => Some(&m.name),
            Message::AddRigidBodyPrimitive(m) => Some(&m.primitive_name),
            Message::FinishAnimation(_) => None,
        }
    }

    /// The keyframe index this message carries, if any.
    pub fn frame_idx(&self) -> Option<u64> {
        match self {
            Message::DeformableMeshes(m) => Some(m.frame_idx),
            Message::UpdateRigidBodyPose(m) => Some(m.frame_idx),
            Message::FinishAnimation(m) => Some(m.end_frame_idx),
            _ => None,
        }
    }
}

impl Meshes {
    /// Create an inline (unchunked) mesh message.
    pub fn new(mesh_name: impl Into<String>, init_pose: Pose, mesh_file: Vec<u8>) -> Self {
        Self {
            mesh_name: mesh_name.into(),
            init_pose,
            chunk_num: 0,
            mesh_file,
        }
    }

    /// Split this message into a chunk announcement plus its fragments.
    ///
    /// The announcement keeps the header fields but an empty `mesh_file`;
    /// `chunk_num` is set to the number of fragments produced. An empty
    /// file still produces one empty chunk so the receiver observes a
    /// complete announcement/chunk exchange.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    pub fn split_chunks(self, chunk_size: usize) -> (Meshes, Vec<MeshesChunk>) {
        assert!(chunk_size > 0, "chunk_size must be nonzero");

        let mut chunks = Vec::new();
        if self.mesh_file.is_empty() {
            chunks.push(MeshesChunk {
                mesh_name: self.mesh_name.clone(),
                chunk_id: 0,
                chunk: Vec::new(),
            });
        } else {
            for (chunk_id, piece) in self.mesh_file.chunks(chunk_size).enumerate() {
                chunks.push(MeshesChunk {
                    mesh_name: self.mesh_name.clone(),
                    chunk_id: chunk_id as u32,
                    chunk: piece.to_vec(),
                });
            }
        }

        let announcement = Meshes {
            mesh_name: self.mesh_name,
            init_pose: self.init_pose,
            chunk_num: chunks.len() as u32,
            mesh_file: Vec::new(),
        };
        (announcement, chunks)
    }
}

impl DeformableMeshes {
    /// Wire name used when this update travels wrapped as a chunked mesh
    /// payload.
    pub fn wrapped_name(&self) -> String {
        format!("{}{}", WRAPPED_DEFORMABLE_PREFIX, self.obj_name)
    }
}
