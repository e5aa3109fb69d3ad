//! # cachestore codec
//!
//! Turns cached values into payload bytes and back.
//!
//! Stores are generic over a [`Codec`], so the wire representation of a cache
//! entry can be swapped per store instance. Two codecs ship with the crate:
//!
//! - [`CborCodec`] - compact binary CBOR via `ciborium` (the default)
//! - [`JsonCodec`] - human-readable JSON via `serde_json`
//!
//! ## Usage
//!
//! ```
//! use cachestore_codec::{CborCodec, Codec};
//!
//! let codec = CborCodec::new();
//! let bytes = codec.encode(&vec![1u32, 2, 3]).unwrap();
//! let back: Vec<u32> = codec.decode(&bytes).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod json;

pub use cbor::CborCodec;
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A serialization codec for cached values.
///
/// Implementations must be deterministic for a given value within a process
/// and must decode whatever they encode.
pub trait Codec: Send + Sync + 'static {
    /// Short identifier, e.g. `"cbor"`.
    fn name(&self) -> &'static str;

    /// Encodes `value` into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EncodingFailed`] if the value cannot be
    /// represented.
    fn encode<T>(&self, value: &T) -> CodecResult<Vec<u8>>
    where
        T: Serialize + ?Sized;

    /// Decodes payload bytes into a value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::DecodingFailed`] if the bytes are malformed or do
    /// not match `T`.
    fn decode<T>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        T: DeserializeOwned;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u64,
        tags: Vec<String>,
        score: Option<i32>,
    }

    fn profile(name: String, visits: u64, tags: Vec<String>, score: Option<i32>) -> Profile {
        Profile {
            name,
            visits,
            tags,
            score,
        }
    }

    proptest! {
        #[test]
        fn cbor_preserves_structs(
            name in ".*",
            visits in any::<u64>(),
            tags in proptest::collection::vec("[a-z]{0,8}", 0..4),
            score in any::<Option<i32>>(),
        ) {
            let value = profile(name, visits, tags, score);
            let codec = CborCodec::new();
            let decoded: Profile = codec.decode(&codec.encode(&value).unwrap()).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn json_preserves_structs(
            name in ".*",
            visits in any::<u64>(),
            tags in proptest::collection::vec("[a-z]{0,8}", 0..4),
            score in any::<Option<i32>>(),
        ) {
            let value = profile(name, visits, tags, score);
            let codec = JsonCodec::new();
            let decoded: Profile = codec.decode(&codec.encode(&value).unwrap()).unwrap();
            prop_assert_eq!(decoded, value);
        }
    }

    #[test]
    fn codecs_are_not_interchangeable() {
        let bytes = CborCodec::new().encode(&42u32).unwrap();
        let result: CodecResult<u32> = JsonCodec::new().decode(&bytes);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
