//! # scenewire
//!
//! Wire protocol for streaming keyframe scene updates from a computation
//! engine to a remote renderer over a single persistent TCP connection,
//! so heavy simulation runs headless while visualization happens
//! elsewhere.
//!
//! ## Architecture
//!
//! Bytes flow through one sequential pipeline per connection:
//!
//! ```text
//! bytes → FrameBuffer → WireCodec → ChunkReassembler → AnimationTracker → handler
//! ```
//!
//! - **Framing**: `[length u32 BE][tag u8][msgpack body]`, so message
//!   boundaries survive arbitrary TCP segmentation.
//! - **Reassembly**: large mesh payloads travel as an announcement plus
//!   chunks, reassembled by chunk id regardless of arrival order.
//! - **Lifecycle**: rigid bodies take pose-only updates; deformable
//!   bodies resend geometry with monotonic non-decreasing frame indices;
//!   `FinishAnimation` is terminal.
//!
//! ## Example
//!
//! ```ignore
//! use scenewire::{DispatchLoop, RenderServer, SceneClient, Message};
//!
//! // Renderer side
//! let server = RenderServer::bind("0.0.0.0:4490").await?;
//! server
//!     .serve(|| {
//!         DispatchLoop::new(|msg: Message| {
//!             // apply the update to the scene graph
//!         })
//!     })
//!     .await?;
//!
//! // Engine side
//! let mut client = SceneClient::connect("renderer:4490").await?;
//! client.add_rigid_body_mesh("chair.obj", pose, mesh_bytes).await?;
//! client.update_pose("chair.obj", pose, 1).await?;
//! client.finish(1, "run1").await?;
//! ```

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod reassembly;
pub mod transport;

mod client;
mod server;

pub use client::SceneClient;
pub use dispatch::{DispatchConfig, DispatchLoop, LoopStatus};
pub use error::{Result, ScenewireError};
pub use lifecycle::{AnimationTracker, ObjectState, RejectReason, Rejection, Verdict};
pub use protocol::{
    AddRigidBodyPrimitive, DeformableMeshes, FinishAnimation, Meshes, MeshesChunk, Message, Pose,
    UpdateRigidBodyPose,
};
pub use reassembly::ChunkReassembler;
pub use server::RenderServer;
