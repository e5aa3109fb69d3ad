//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding a cached value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("{codec} encoding failed: {message}")]
    EncodingFailed {
        /// Codec that rejected the value.
        codec: &'static str,
        /// Description of the encoding error.
        message: String,
    },

    /// The payload could not be decoded into the requested type.
    #[error("{codec} decoding failed: {message}")]
    DecodingFailed {
        /// Codec that rejected the payload.
        codec: &'static str,
        /// Description of the decoding error.
        message: String,
    },
}

impl CodecError {
    /// Creates an encoding failed error.
    pub fn encoding_failed(codec: &'static str, message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            codec,
            message: message.into(),
        }
    }

    /// Creates a decoding failed error.
    pub fn decoding_failed(codec: &'static str, message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            codec,
            message: message.into(),
        }
    }
}
