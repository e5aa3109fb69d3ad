//! CBOR codec.

use crate::error::{CodecError, CodecResult};
use crate::Codec;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes values as CBOR with `ciborium`.
///
/// This is the default codec: payloads are compact and self-describing,
/// so the CLI can still render them without knowing the Rust type.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Creates a CBOR codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Codec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode<T>(&self, value: &T) -> CodecResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| CodecError::encoding_failed(self.name(), e.to_string()))?;
        Ok(buf)
    }

    fn decode<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned,
    {
        ciborium::from_reader(bytes)
            .map_err(|e| CodecError::decoding_failed(self.name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_are_one_byte() {
        let bytes = CborCodec::new().encode(&7u8).unwrap();
        assert_eq!(bytes, vec![0x07]);
    }

    #[test]
    fn text_round_trips() {
        let codec = CborCodec::new();
        let bytes = codec.encode("abc").unwrap();
        assert_eq!(bytes, vec![0x63, b'a', b'b', b'c']);
        let back: String = codec.decode(&bytes).unwrap();
        assert_eq!(back, "abc");
    }

    #[test]
    fn wrong_type_is_a_decoding_error() {
        let codec = CborCodec::new();
        let bytes = codec.encode("not a number").unwrap();
        let result: CodecResult<u64> = codec.decode(&bytes);
        assert!(matches!(
            result,
            Err(CodecError::DecodingFailed { codec: "cbor", .. })
        ));
    }

    #[test]
    fn truncated_payload_is_a_decoding_error() {
        let codec = CborCodec::new();
        let bytes = codec.encode(&vec!["a", "b", "c"]).unwrap();
        let result: CodecResult<Vec<String>> = codec.decode(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }
}
