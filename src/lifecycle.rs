//! Per-object lifecycle tracking and the session finish contract.
//!
//! Every scene object is either rigid (geometry fixed at creation, pose
//! updated per frame) or deformable (full geometry resent per keyframe,
//! frame indices monotonic non-decreasing). The tracker enforces that
//! contract plus the terminal `FinishAnimation` transition. Violations are
//! *rejections*, not errors: the connection stays open and later valid
//! messages for other objects keep flowing.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::protocol::Message;

/// Lifecycle state of one named scene object.
///
/// Absence from the tracker's map is the `Uninitialized` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Created as a rigid body; only pose updates are valid.
    RigidInitialized,
    /// Deformable, last seen at this keyframe index.
    DeformableAt(u64),
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectState::RigidInitialized => write!(f, "RigidInitialized"),
            ObjectState::DeformableAt(frame) => write!(f, "DeformableAt({frame})"),
        }
    }
}

/// Why a message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Update or non-zero-frame creation for an object that was never
    /// initialized.
    CreatedWithoutInit,
    /// Rigid-style message for a deformable object or vice versa.
    TypeMismatch,
    /// Deformable frame index regressed below a previously seen index.
    FrameRegression,
    /// Message arrived after `FinishAnimation` was processed.
    SessionFinished,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::CreatedWithoutInit => "CreatedWithoutInit",
            RejectReason::TypeMismatch => "TypeMismatch",
            RejectReason::FrameRegression => "FrameRegression",
            RejectReason::SessionFinished => "SessionFinished",
        };
        f.write_str(s)
    }
}

/// A rejected message, with enough context for the remote sender's
/// operator to diagnose the protocol-usage bug without packet capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Why the message was rejected.
    pub reason: RejectReason,
    /// Offending object name, if the message names one.
    pub object: Option<String>,
    /// Variant name of the offending message.
    pub tag: &'static str,
    /// Object (or session) state at the time of rejection.
    pub current_state: String,
    /// What the message attempted.
    pub attempted: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected ({}): object={}, state={}, attempted={}",
            self.tag,
            self.reason,
            self.object.as_deref().unwrap_or("<session>"),
            self.current_state,
            self.attempted,
        )
    }
}

/// Outcome of validating one ready message.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Message is valid; deliver it to the handler.
    Accepted(Message),
    /// Message violates the lifecycle contract; surface as an error event.
    Rejected(Rejection),
}

/// Per-connection lifecycle state machine.
///
/// Owned exclusively by the connection's pipeline; torn down with it.
pub struct AnimationTracker {
    /// Lifecycle state per object name. Absent = uninitialized.
    objects: HashMap<String, ObjectState>,
    /// Set once a `FinishAnimation` is processed; terminal.
    finished: bool,
    /// Highest keyframe index seen on any accepted message.
    max_frame_seen: u64,
}

impl AnimationTracker {
    /// Create a tracker for a fresh session.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            finished: false,
            max_frame_seen: 0,
        }
    }

    /// True once a `FinishAnimation` has been accepted.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Highest keyframe index seen on any accepted message.
    pub fn max_frame_seen(&self) -> u64 {
        self.max_frame_seen
    }

    /// Current lifecycle state of an object, if it was ever initialized.
    pub fn object_state(&self, name: &str) -> Option<ObjectState> {
        self.objects.get(name).copied()
    }

    /// Validate one ready (fully assembled) message against the lifecycle
    /// contract and record its transition.
    pub fn validate(&mut self, message: Message) -> Verdict {
        if self.finished {
            return Verdict::Rejected(Rejection {
                reason: RejectReason::SessionFinished,
                object: message.object_name().map(str::to_string),
                tag: message.tag_name(),
                current_state: "Finished".to_string(),
                attempted: "update after FinishAnimation".to_string(),
            });
        }

        match &message {
            Message::Meshes(m) => {
                match self.objects.get(&m.mesh_name) {
                    None => {
                        self.objects
                            .insert(m.mesh_name.clone(), ObjectState::RigidInitialized);
                    }
                    Some(ObjectState::RigidInitialized) => {
                        // Geometry re-upload for an existing rigid body
                        debug!(object = %m.mesh_name, "rigid geometry re-upload");
                    }
                    Some(state @ ObjectState::DeformableAt(_)) => {
                        return self.reject_type_mismatch(&message, *state);
                    }
                }
            }
            Message::AddRigidBodyPrimitive(m) => match self.objects.get(&m.primitive_name) {
                None => {
                    self.objects
                        .insert(m.primitive_name.clone(), ObjectState::RigidInitialized);
                }
                Some(ObjectState::RigidInitialized) => {
                    debug!(object = %m.primitive_name, "primitive re-creation");
                }
                Some(state @ ObjectState::DeformableAt(_)) => {
                    return self.reject_type_mismatch(&message, *state);
                }
            },
            Message::UpdateRigidBodyPose(m) => match self.objects.get(&m.name) {
                Some(ObjectState::RigidInitialized) => {}
                None => {
                    return Verdict::Rejected(Rejection {
                        reason: RejectReason::CreatedWithoutInit,
                        object: Some(m.name.clone()),
                        tag: message.tag_name(),
                        current_state: "Uninitialized".to_string(),
                        attempted: format!("pose update at frame {}", m.frame_idx),
                    });
                }
                Some(state @ ObjectState::DeformableAt(_)) => {
                    return self.reject_type_mismatch(&message, *state);
                }
            },
            Message::DeformableMeshes(m) => match self.objects.get(&m.obj_name) {
                None => {
                    if m.frame_idx != 0 {
                        return Verdict::Rejected(Rejection {
                            reason: RejectReason::CreatedWithoutInit,
                            object: Some(m.obj_name.clone()),
                            tag: message.tag_name(),
                            current_state: "Uninitialized".to_string(),
                            attempted: format!("deformable creation at frame {}", m.frame_idx),
                        });
                    }
                    self.objects
                        .insert(m.obj_name.clone(), ObjectState::DeformableAt(0));
                }
                Some(ObjectState::DeformableAt(last)) => {
                    if m.frame_idx < *last {
                        return Verdict::Rejected(Rejection {
                            reason: RejectReason::FrameRegression,
                            object: Some(m.obj_name.clone()),
                            tag: message.tag_name(),
                            current_state: ObjectState::DeformableAt(*last).to_string(),
                            attempted: format!("frame {}", m.frame_idx),
                        });
                    }
                    self.objects
                        .insert(m.obj_name.clone(), ObjectState::DeformableAt(m.frame_idx));
                }
                Some(state @ ObjectState::RigidInitialized) => {
                    return self.reject_type_mismatch(&message, *state);
                }
            },
            Message::FinishAnimation(m) => {
                if m.end_frame_idx < self.max_frame_seen {
                    warn!(
                        end_frame_idx = m.end_frame_idx,
                        max_frame_seen = self.max_frame_seen,
                        "animation finished before its highest seen frame"
                    );
                }
                self.finished = true;
            }
            Message::MeshesChunk(m) => {
                // Chunks are consumed by the reassembler and never reach a
                // correctly wired tracker
                debug!(mesh_name = %m.mesh_name, "raw chunk reached the tracker, passing through");
            }
        }

        if let Some(frame_idx) = message.frame_idx() {
            self.max_frame_seen = self.max_frame_seen.max(frame_idx);
        }

        Verdict::Accepted(message)
    }

    fn reject_type_mismatch(&self, message: &Message, state: ObjectState) -> Verdict {
        Verdict::Rejected(Rejection {
            reason: RejectReason::TypeMismatch,
            object: message.object_name().map(str::to_string),
            tag: message.tag_name(),
            current_state: state.to_string(),
            attempted: format!("{} update", message.tag_name()),
        })
    }
}

impl Default for AnimationTracker {
    fn default() -> Self {
        Self::new()
    }
}
