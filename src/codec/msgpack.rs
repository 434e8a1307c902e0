//! MsgPack codec using `rmp-serde`.
//!
//! Always uses `to_vec_named` so structs are serialized as maps with field
//! names rather than positional arrays. That keeps the body encoding
//! self-describing: field presence is fixed per tag, and a renderer
//! implemented in another language can decode bodies without a schema
//! compiled in.

use crate::error::Result;

/// MessagePack codec for message bodies.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// The raw rmp error is kept here; callers that decode wire frames map
    /// failures to `MalformedFrame` with frame context attached.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(
        bytes: &[u8],
    ) -> std::result::Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: TestStruct = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_struct_as_map_format() {
        // Map format starts with 0x8X (fixmap); array format would be 0x9X
        let test = TestStruct {
            id: 1,
            name: "x".to_string(),
            active: false,
        };

        let encoded = MsgPackCodec::encode(&test).unwrap();
        assert_eq!(
            encoded[0] & 0xF0,
            0x80,
            "Expected map format (0x8X), got {:02X}",
            encoded[0]
        );
    }

    #[test]
    fn test_binary_blob_as_bin_format() {
        // Blob fields must travel as msgpack bin (0xc4 = bin8), not as an
        // array of integers and never text-escaped
        let data: Vec<u8> = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let encoded = MsgPackCodec::encode(&serde_bytes::Bytes::new(&data)).unwrap();

        assert_eq!(encoded[0], 0xc4, "Expected bin8 format");

        let decoded: serde_bytes::ByteBuf = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), &data);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let invalid = b"not valid msgpack";
        let result: std::result::Result<TestStruct, _> = MsgPackCodec::decode(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_f64_roundtrip() {
        let n: f64 = 3.14159;
        let encoded = MsgPackCodec::encode(&n).unwrap();
        let decoded: f64 = MsgPackCodec::decode(&encoded).unwrap();
        assert!((decoded - n).abs() < f64::EPSILON);
    }
}
