//! Chunk reassembly for large mesh payloads.
//!
//! A large `mesh_file` crosses the wire as a [`Meshes`] announcement
//! (`chunk_num` set, empty file) followed by `chunk_num` [`MeshesChunk`]
//! fragments. Fragments of one file are not guaranteed to arrive in
//! `chunk_id` order, and fragments may even precede their announcement;
//! the reassembler buffers per mesh name and emits exactly one assembled
//! message once every id in `[0, chunk_num)` is present.
//!
//! Names carrying [`WRAPPED_DEFORMABLE_PREFIX`] hold an encoded
//! [`DeformableMeshes`] instead of a mesh file; the assembled payload is
//! decoded and the deformable update is emitted in its place.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::codec::MsgPackCodec;
use crate::error::{Result, ScenewireError};
use crate::protocol::{Meshes, MeshesChunk, Message, WRAPPED_DEFORMABLE_PREFIX};

/// Partial state for one in-flight chunked payload.
#[derive(Debug, Default)]
struct ReassemblyBuffer {
    /// The owning announcement, once seen. Fixes `chunk_num`.
    announcement: Option<Meshes>,
    /// Received fragments by chunk id. Duplicates overwrite.
    chunks: HashMap<u32, Vec<u8>>,
}

impl ReassemblyBuffer {
    /// Completion requires the announcement: every id in
    /// `[0, chunk_num)` present. Ids are range-checked on insert, so a
    /// full count means a full id set.
    fn is_complete(&self) -> bool {
        match &self.announcement {
            Some(a) => self.chunks.len() as u32 == a.chunk_num,
            None => false,
        }
    }
}

/// Buffers `MeshesChunk` fragments and emits fully assembled payloads.
///
/// Owned by one connection's pipeline; discarded wholesale on disconnect
/// (partial payloads are never delivered).
pub struct ChunkReassembler {
    /// In-flight buffers keyed by mesh name.
    buffers: HashMap<String, ReassemblyBuffer>,
    /// Names whose payload was already assembled and emitted. Late
    /// fragments for these are dropped, not fatal.
    completed: HashSet<String>,
}

impl ChunkReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            completed: HashSet::new(),
        }
    }

    /// Feed one decoded message through the reassembler.
    ///
    /// Non-fragmented variants pass through unchanged. Announcements and
    /// fragments return `None` until the payload completes, then exactly
    /// one assembled message.
    ///
    /// # Errors
    ///
    /// - `ChunkOutOfRange` if a fragment's id is at or past the announced
    ///   count, meaning the chunk count announcement cannot be trusted.
    /// - `MalformedFrame` if a wrapped deformable payload does not decode.
    pub fn feed(&mut self, message: Message) -> Result<Option<Message>> {
        match message {
            Message::Meshes(meshes) if meshes.chunk_num > 0 => self.feed_announcement(meshes),
            Message::MeshesChunk(chunk) => self.feed_chunk(chunk),
            other => Ok(Some(other)),
        }
    }

    /// Number of in-flight (incomplete) payloads.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    fn feed_announcement(&mut self, meshes: Meshes) -> Result<Option<Message>> {
        // A fresh announcement reopens a name for a new transfer cycle
        self.completed.remove(&meshes.mesh_name);

        let buffer = self.buffers.entry(meshes.mesh_name.clone()).or_default();

        // Fragments may have arrived ahead of the announcement; their ids
        // can only be range-checked now
        if let Some(&bad_id) = buffer.chunks.keys().find(|&&id| id >= meshes.chunk_num) {
            return Err(ScenewireError::ChunkOutOfRange {
                mesh_name: meshes.mesh_name,
                chunk_id: bad_id,
                chunk_num: meshes.chunk_num,
            });
        }

        buffer.announcement = Some(meshes.clone());
        if buffer.is_complete() {
            return self.finish(&meshes.mesh_name).map(Some);
        }
        Ok(None)
    }

    fn feed_chunk(&mut self, chunk: MeshesChunk) -> Result<Option<Message>> {
        if self.completed.contains(&chunk.mesh_name) && !self.buffers.contains_key(&chunk.mesh_name)
        {
            debug!(
                mesh_name = %chunk.mesh_name,
                chunk_id = chunk.chunk_id,
                "dropping late chunk for already-assembled payload"
            );
            return Ok(None);
        }

        let buffer = self.buffers.entry(chunk.mesh_name.clone()).or_default();

        if let Some(announcement) = &buffer.announcement {
            if chunk.chunk_id >= announcement.chunk_num {
                return Err(ScenewireError::ChunkOutOfRange {
                    mesh_name: chunk.mesh_name,
                    chunk_id: chunk.chunk_id,
                    chunk_num: announcement.chunk_num,
                });
            }
        }

        buffer.chunks.insert(chunk.chunk_id, chunk.chunk);

        if buffer.is_complete() {
            return self.finish(&chunk.mesh_name).map(Some);
        }
        Ok(None)
    }

    /// Assemble a completed buffer, discard it, and synthesize the
    /// delivered message.
    fn finish(&mut self, mesh_name: &str) -> Result<Message> {
        let mut buffer = self.buffers.remove(mesh_name).unwrap_or_default();
        let announcement = match buffer.announcement.take() {
            Some(a) => a,
            None => {
                return Err(ScenewireError::MalformedFrame(format!(
                    "payload \"{mesh_name}\" completed without an announcement"
                )))
            }
        };

        let total: usize = buffer.chunks.values().map(Vec::len).sum();
        let mut mesh_file = Vec::with_capacity(total);
        // chunk_id order, not arrival order
        for chunk_id in 0..announcement.chunk_num {
            match buffer.chunks.remove(&chunk_id) {
                Some(piece) => mesh_file.extend_from_slice(&piece),
                None => {
                    return Err(ScenewireError::MalformedFrame(format!(
                        "payload \"{mesh_name}\" missing chunk {chunk_id} at assembly"
                    )))
                }
            }
        }

        self.completed.insert(mesh_name.to_string());
        debug!(
            mesh_name,
            chunk_num = announcement.chunk_num,
            bytes = mesh_file.len(),
            "chunked payload assembled"
        );

        if mesh_name.starts_with(WRAPPED_DEFORMABLE_PREFIX) {
            let deformable = MsgPackCodec::decode(&mesh_file).map_err(|e| {
                ScenewireError::MalformedFrame(format!(
                    "wrapped deformable payload \"{mesh_name}\" did not decode: {e}"
                ))
            })?;
            return Ok(Message::DeformableMeshes(deformable));
        }

        Ok(Message::Meshes(Meshes {
            mesh_file,
            ..announcement
        }))
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}
