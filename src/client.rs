//! Engine-side client: typed senders over one persistent connection.
//!
//! Large mesh files are split into an announcement plus 60 KB chunks
//! transparently; large deformable updates are wrapped as chunked mesh
//! payloads under a reserved name prefix and unwrapped by the receiver's
//! reassembler. Small messages go out as single frames.
//!
//! Write errors are fatal: with a single persistent connection there is
//! nothing to retry against; session re-establishment is the caller's
//! policy.

use std::collections::BTreeMap;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::codec::{MsgPackCodec, WireCodec};
use crate::error::Result;
use crate::protocol::{
    AddRigidBodyPrimitive, DeformableMeshes, FinishAnimation, Meshes, Message, Pose,
    UpdateRigidBodyPose, CHUNK_SIZE, IDENTITY_POSE,
};

/// Engine-side sender for one scene-streaming session.
pub struct SceneClient<W> {
    writer: W,
    chunk_size: usize,
}

impl SceneClient<TcpStream> {
    /// Connect to a renderer.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_writer(stream))
    }
}

impl<W: AsyncWrite + Unpin> SceneClient<W> {
    /// Wrap an existing writer (tests, alternative transports).
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the chunk size used when splitting large payloads.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Send one already-built message.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let bytes = WireCodec::encode(message)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Create a rigid body from a mesh file.
    ///
    /// Files larger than the chunk size are sent as an announcement plus
    /// chunks; the renderer sees a single assembled message either way.
    pub async fn add_rigid_body_mesh(
        &mut self,
        mesh_name: impl Into<String>,
        init_pose: Pose,
        mesh_file: Vec<u8>,
    ) -> Result<()> {
        let meshes = Meshes::new(mesh_name, init_pose, mesh_file);
        if meshes.mesh_file.len() <= self.chunk_size {
            return self.send(&Message::Meshes(meshes)).await;
        }
        self.send_chunked(meshes).await
    }

    /// Create a rigid body from a renderer-defined primitive.
    pub async fn add_primitive(
        &mut self,
        primitive_name: impl Into<String>,
        primitive_type: impl Into<String>,
        params: BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        self.send(&Message::AddRigidBodyPrimitive(AddRigidBodyPrimitive {
            primitive_name: primitive_name.into(),
            primitive_type: primitive_type.into(),
            params,
        }))
        .await
    }

    /// Update a rigid body's pose at a keyframe.
    pub async fn update_pose(
        &mut self,
        name: impl Into<String>,
        pose: Pose,
        frame_idx: u64,
    ) -> Result<()> {
        self.send(&Message::UpdateRigidBodyPose(UpdateRigidBodyPose {
            name: name.into(),
            pose,
            frame_idx,
        }))
        .await
    }

    /// Send a deformable object's geometry for one keyframe.
    ///
    /// Updates whose encoded body exceeds the chunk size travel wrapped
    /// as a chunked mesh payload under the reserved deformable prefix.
    pub async fn send_deformable(&mut self, update: DeformableMeshes) -> Result<()> {
        let body = MsgPackCodec::encode(&update)?;
        if body.len() <= self.chunk_size {
            return self.send(&Message::DeformableMeshes(update)).await;
        }

        debug!(
            obj_name = %update.obj_name,
            frame_idx = update.frame_idx,
            bytes = body.len(),
            "wrapping oversized deformable update as chunked payload"
        );
        let wrapper = Meshes::new(update.wrapped_name(), IDENTITY_POSE, body);
        self.send_chunked(wrapper).await
    }

    /// Finish the animation. This must be the last message of the session.
    pub async fn finish(&mut self, end_frame_idx: u64, exp_name: impl Into<String>) -> Result<()> {
        self.send(&Message::FinishAnimation(FinishAnimation {
            end_frame_idx,
            exp_name: exp_name.into(),
        }))
        .await
    }

    /// Flush and shut down the write side.
    pub async fn shutdown(mut self) -> Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send_chunked(&mut self, meshes: Meshes) -> Result<()> {
        let (announcement, chunks) = meshes.split_chunks(self.chunk_size);
        debug!(
            mesh_name = %announcement.mesh_name,
            chunk_num = announcement.chunk_num,
            "sending chunked payload"
        );
        self.send(&Message::Meshes(announcement)).await?;
        for chunk in chunks {
            self.send(&Message::MeshesChunk(chunk)).await?;
        }
        Ok(())
    }
}
