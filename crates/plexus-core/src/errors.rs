//! Error types for frames and codecs.

use thiserror::Error;

/// A frame could not be written to or read from JSON text.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Serialization failed.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound text is not valid JSON or not a known frame shape.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// A payload could not be converted to or from its typed form.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload bytes are not a valid protocol buffer message.
    #[error("protobuf codec: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Payload bytes are not UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Failure reported by a user-supplied codec.
    #[error("{codec} codec: {message}")]
    Custom {
        /// Codec name.
        codec: String,
        /// What went wrong.
        message: String,
    },
}

impl CodecError {
    /// Convenience constructor for codecs outside this crate.
    pub fn custom(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Custom {
            codec: codec.into(),
            message: message.into(),
        }
    }
}
