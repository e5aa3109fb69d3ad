//! JSON codec.

use crate::error::{CodecError, CodecResult};
use crate::Codec;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes values as JSON with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T>(&self, value: &T) -> CodecResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
            .map_err(|e| CodecError::encoding_failed(self.name(), e.to_string()))
    }

    fn decode<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::decoding_failed(self.name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn output_is_plain_json() {
        let bytes = JsonCodec::new().encode(&vec![1, 2]).unwrap();
        assert_eq!(bytes, b"[1,2]");
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "bytes as key");
        let result = JsonCodec::new().encode(&map);
        assert!(matches!(
            result,
            Err(CodecError::EncodingFailed { codec: "json", .. })
        ));
    }

    #[test]
    fn garbage_is_a_decoding_error() {
        let result: CodecResult<String> = JsonCodec::new().decode(b"{not json");
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
