//! Connection-level dispatch loop.
//!
//! Drives one connection end-to-end: read bytes → extract frames → decode
//! messages → reassemble chunked payloads → validate lifecycle → invoke
//! the handler, strictly in the order messages become *ready*. Reassembly
//! may delay a fragmented payload behind later, smaller messages that
//! complete first; readiness order, not arrival order, is the delivery
//! contract.
//!
//! The handler is a single synchronous callback. The loop waits for it to
//! return before reading further, so a slow handler stalls reads and the
//! remote sender is throttled by TCP flow control.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::codec::WireCodec;
use crate::error::Result;
use crate::lifecycle::{AnimationTracker, Rejection, Verdict};
use crate::protocol::{FrameBuffer, Message, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::reassembly::ChunkReassembler;

/// Default socket read buffer size (64 KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Tuning knobs for one connection's pipeline.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum accepted frame payload size.
    pub max_payload_size: u32,
    /// Socket read buffer size.
    pub read_buffer_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// What the pipeline should do after processing a batch of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Keep reading.
    Continue,
    /// `FinishAnimation` was dispatched; attempt no further reads.
    Finished,
}

/// One connection's sequential pipeline.
///
/// Owns the frame buffer, reassembler and lifecycle tracker for exactly
/// one connection; all state is discarded when the loop is dropped. No
/// locking anywhere: the pipeline runs on a single task and shares
/// nothing.
pub struct DispatchLoop {
    frame_buffer: FrameBuffer,
    reassembler: ChunkReassembler,
    tracker: AnimationTracker,
    handler: Box<dyn FnMut(Message) + Send>,
    on_reject: Box<dyn FnMut(&Rejection) + Send>,
    read_buffer_size: usize,
}

impl DispatchLoop {
    /// Create a pipeline with default configuration.
    ///
    /// `handler` is invoked once per accepted message, in delivery order.
    /// Rejections are logged at `warn` unless a callback is installed via
    /// [`on_rejection`](Self::on_rejection).
    pub fn new(handler: impl FnMut(Message) + Send + 'static) -> Self {
        Self::with_config(DispatchConfig::default(), handler)
    }

    /// Create a pipeline with explicit configuration.
    pub fn with_config(
        config: DispatchConfig,
        handler: impl FnMut(Message) + Send + 'static,
    ) -> Self {
        Self {
            frame_buffer: FrameBuffer::with_max_payload(config.max_payload_size),
            reassembler: ChunkReassembler::new(),
            tracker: AnimationTracker::new(),
            handler: Box::new(handler),
            on_reject: Box::new(|rejection| warn!(%rejection, "message rejected")),
            read_buffer_size: config.read_buffer_size,
        }
    }

    /// Install a rejection callback, replacing the default warn log.
    ///
    /// Rejections are surfaced here as error events; the connection stays
    /// open (log-and-continue policy).
    pub fn on_rejection(mut self, on_reject: impl FnMut(&Rejection) + Send + 'static) -> Self {
        self.on_reject = Box::new(on_reject);
        self
    }

    /// True once `FinishAnimation` has been dispatched.
    pub fn finished(&self) -> bool {
        self.tracker.finished()
    }

    /// Process a batch of raw bytes from the transport.
    ///
    /// This is the whole pipeline minus the socket: every complete frame
    /// is decoded, reassembled, validated and dispatched before the call
    /// returns. Errors out of here (codec, reassembly) are fatal to the
    /// connection.
    pub fn pump(&mut self, data: &[u8]) -> Result<LoopStatus> {
        let frames = self.frame_buffer.push(data)?;

        for frame in frames {
            let message = WireCodec::decode(&frame)?;

            let Some(ready) = self.reassembler.feed(message)? else {
                continue;
            };

            let finish = matches!(ready, Message::FinishAnimation(_));
            match self.tracker.validate(ready) {
                Verdict::Accepted(message) => {
                    (self.handler)(message);
                    if finish {
                        return Ok(LoopStatus::Finished);
                    }
                }
                Verdict::Rejected(rejection) => (self.on_reject)(&rejection),
            }
        }

        Ok(LoopStatus::Continue)
    }

    /// Drive the pipeline from an async reader until the animation
    /// finishes, the transport closes, or a fatal error occurs.
    ///
    /// Reading a frame is the only suspension point; everything
    /// downstream of the read is synchronous.
    pub async fn run<R: AsyncRead + Unpin>(mut self, mut reader: R) -> Result<()> {
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                if self.frame_buffer.mid_frame() {
                    return Err(crate::error::ScenewireError::ConnectionClosed);
                }
                if self.reassembler.pending() > 0 {
                    warn!(
                        pending_payloads = self.reassembler.pending(),
                        "connection closed with unfinished chunked payloads, discarding"
                    );
                } else {
                    debug!("connection closed cleanly");
                }
                return Ok(());
            }

            if self.pump(&buf[..n])? == LoopStatus::Finished {
                debug!("animation finished, closing connection");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RejectReason;
    use crate::protocol::{
        DeformableMeshes, FinishAnimation, Meshes, Message, UpdateRigidBodyPose, IDENTITY_POSE,
    };
    use std::sync::{Arc, Mutex};

    /// Pipeline capturing accepted messages and rejection reasons.
    fn capture_loop() -> (
        DispatchLoop,
        Arc<Mutex<Vec<Message>>>,
        Arc<Mutex<Vec<RejectReason>>>,
    ) {
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let rejected = Arc::new(Mutex::new(Vec::new()));

        let accepted_clone = accepted.clone();
        let rejected_clone = rejected.clone();
        let pipeline = DispatchLoop::new(move |msg| {
            accepted_clone.lock().unwrap().push(msg);
        })
        .on_rejection(move |r| {
            rejected_clone.lock().unwrap().push(r.reason);
        });

        (pipeline, accepted, rejected)
    }

    fn encode(msg: &Message) -> Vec<u8> {
        WireCodec::encode(msg).unwrap()
    }

    fn mesh_msg(name: &str, chunk_num: u32, file: &[u8]) -> Message {
        Message::Meshes(Meshes {
            mesh_name: name.to_string(),
            init_pose: IDENTITY_POSE,
            chunk_num,
            mesh_file: file.to_vec(),
        })
    }

    fn chunk_msg(name: &str, chunk_id: u32, data: &[u8]) -> Message {
        Message::MeshesChunk(crate::protocol::MeshesChunk {
            mesh_name: name.to_string(),
            chunk_id,
            chunk: data.to_vec(),
        })
    }

    fn finish_msg() -> Message {
        Message::FinishAnimation(FinishAnimation {
            end_frame_idx: 10,
            exp_name: "run1".to_string(),
        })
    }

    #[test]
    fn test_scenario_a_single_chunk_mesh() {
        let (mut pipeline, accepted, _) = capture_loop();

        let mut bytes = encode(&mesh_msg("chair", 1, b""));
        bytes.extend(encode(&chunk_msg("chair", 0, b"geometry")));

        assert_eq!(pipeline.pump(&bytes).unwrap(), LoopStatus::Continue);

        let accepted = accepted.lock().unwrap();
        assert_eq!(accepted.len(), 1);
        match &accepted[0] {
            Message::Meshes(m) => {
                assert_eq!(m.mesh_name, "chair");
                assert_eq!(m.mesh_file, b"geometry");
            }
            other => panic!("expected Meshes, got {other:?}"),
        }
    }

    #[test]
    fn test_scenario_b_out_of_order_chunks() {
        let (mut pipeline, accepted, _) = capture_loop();

        let mut bytes = encode(&mesh_msg("chair", 3, b""));
        bytes.extend(encode(&chunk_msg("chair", 2, b"CC")));
        bytes.extend(encode(&chunk_msg("chair", 0, b"AA")));

        pipeline.pump(&bytes).unwrap();
        assert!(accepted.lock().unwrap().is_empty(), "no delivery until chunk 1");

        pipeline.pump(&encode(&chunk_msg("chair", 1, b"BB"))).unwrap();

        let accepted = accepted.lock().unwrap();
        assert_eq!(accepted.len(), 1);
        match &accepted[0] {
            Message::Meshes(m) => assert_eq!(m.mesh_file, b"AABBCC"),
            other => panic!("expected Meshes, got {other:?}"),
        }
    }

    #[test]
    fn test_scenario_c_frame_regression() {
        let (mut pipeline, accepted, rejected) = capture_loop();

        let deformable = |frame_idx| {
            Message::DeformableMeshes(DeformableMeshes {
                obj_name: "blob".to_string(),
                frame_idx,
                particles: vec![[0.0, 0.0, 0.0]],
                faces: vec![],
            })
        };

        let mut bytes = encode(&deformable(0));
        bytes.extend(encode(&deformable(5)));
        bytes.extend(encode(&deformable(3)));

        pipeline.pump(&bytes).unwrap();

        assert_eq!(accepted.lock().unwrap().len(), 2);
        assert_eq!(
            rejected.lock().unwrap().as_slice(),
            &[RejectReason::FrameRegression]
        );
    }

    #[test]
    fn test_scenario_d_finish_terminality() {
        let (mut pipeline, accepted, rejected) = capture_loop();

        let status = pipeline.pump(&encode(&finish_msg())).unwrap();
        assert_eq!(status, LoopStatus::Finished);
        assert!(pipeline.finished());
        assert_eq!(accepted.lock().unwrap().len(), 1);

        let pose = Message::UpdateRigidBodyPose(UpdateRigidBodyPose {
            name: "chair".to_string(),
            pose: IDENTITY_POSE,
            frame_idx: 11,
        });
        pipeline.pump(&encode(&pose)).unwrap();

        assert_eq!(accepted.lock().unwrap().len(), 1);
        assert_eq!(
            rejected.lock().unwrap().as_slice(),
            &[RejectReason::SessionFinished]
        );
    }

    #[test]
    fn test_readiness_order_not_arrival_order() {
        let (mut pipeline, accepted, _) = capture_loop();

        // Announce a 2-chunk mesh, deliver one chunk, then a complete
        // small message, then the last chunk
        let mut bytes = encode(&mesh_msg("big", 2, b""));
        bytes.extend(encode(&chunk_msg("big", 0, b"AA")));
        bytes.extend(encode(&mesh_msg("small", 0, b"tiny")));
        bytes.extend(encode(&chunk_msg("big", 1, b"BB")));

        pipeline.pump(&bytes).unwrap();

        let accepted = accepted.lock().unwrap();
        let names: Vec<_> = accepted
            .iter()
            .map(|m| m.object_name().unwrap().to_string())
            .collect();
        // "small" became ready first even though "big" started arriving earlier
        assert_eq!(names, vec!["small", "big"]);
    }

    #[test]
    fn test_fatal_unknown_tag_propagates() {
        let (mut pipeline, _, _) = capture_loop();

        let bytes = crate::protocol::build_frame(99, b"\xc0");
        let err = pipeline.pump(&bytes).unwrap_err();
        assert!(matches!(err, crate::error::ScenewireError::UnknownTag(99)));
    }

    #[test]
    fn test_fragmented_delivery_across_pumps() {
        let (mut pipeline, accepted, _) = capture_loop();

        let bytes = encode(&mesh_msg("chair", 0, b"inline-geometry"));
        for byte in &bytes {
            pipeline.pump(&[*byte]).unwrap();
        }

        assert_eq!(accepted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_terminates_on_finish() {
        let (mut client_end, server_end) = tokio::io::duplex(1024);

        let accepted = Arc::new(Mutex::new(Vec::new()));
        let accepted_clone = accepted.clone();
        let pipeline = DispatchLoop::new(move |msg| {
            accepted_clone.lock().unwrap().push(msg.tag_name());
        });

        let server = tokio::spawn(pipeline.run(server_end));

        use tokio::io::AsyncWriteExt;
        client_end
            .write_all(&encode(&mesh_msg("chair", 0, b"g")))
            .await
            .unwrap();
        client_end.write_all(&encode(&finish_msg())).await.unwrap();
        client_end.flush().await.unwrap();

        // The loop must exit on its own after finish, without the client
        // closing its end
        server.await.unwrap().unwrap();
        assert_eq!(
            accepted.lock().unwrap().as_slice(),
            &["Meshes", "FinishAnimation"]
        );
    }

    #[tokio::test]
    async fn test_run_clean_eof() {
        let (client_end, server_end) = tokio::io::duplex(1024);
        let pipeline = DispatchLoop::new(|_| {});
        drop(client_end);
        pipeline.run(server_end).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_eof_mid_frame_is_fatal() {
        let (mut client_end, server_end) = tokio::io::duplex(1024);
        let pipeline = DispatchLoop::new(|_| {});

        use tokio::io::AsyncWriteExt;
        let bytes = encode(&finish_msg());
        // Truncate inside the frame body
        client_end.write_all(&bytes[..bytes.len() - 2]).await.unwrap();
        drop(client_end);

        let err = pipeline.run(server_end).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ScenewireError::ConnectionClosed
        ));
    }
}
