//! Codec module: serialization/deserialization for messages.
//!
//! - [`MsgPackCodec`]: MessagePack bodies via `rmp-serde`
//!   (`to_vec_named`, struct-as-map)
//! - [`WireCodec`]: `Message` to tagged, length-prefixed frame bytes and back
//!
//! Codecs are marker structs with static methods rather than trait
//! objects; the variant set is closed, so dispatch is an exhaustive match.

mod msgpack;
mod wire;

pub use msgpack::MsgPackCodec;
pub use wire::WireCodec;
