//! Client error types.

use plexus_core::{CodecError, CorrelationId, ErrorFrame, FrameError, MessageType};
use thiserror::Error;

/// Convenience alias for client results.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Failures of the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect {
        /// Target endpoint.
        endpoint: String,
        /// Why the attempt failed.
        reason: String,
    },

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The connection is already closed.
    #[error("transport closed")]
    Closed,
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON did not match the configuration shape.
    #[error("invalid client config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
}

/// Errors surfaced to callers of the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint answered the exchange with an `ERROR` frame.
    #[error("endpoint rejected exchange: {0}")]
    Protocol(Box<ErrorFrame>),

    /// The connection dropped before the exchange completed.
    #[error("connection lost before a reply arrived")]
    ConnectionLost,

    /// The connection manager was closed by its owner.
    #[error("connection manager is closed")]
    ConnectionClosed,

    /// No transport is open right now.
    #[error("not connected")]
    NotConnected,

    /// The service handle belongs to a session that has since been torn down.
    #[error("service '{service}' was discarded with its session")]
    ServiceDiscarded {
        /// Service name.
        service: String,
    },

    /// No reply arrived within the configured request timeout.
    #[error("no reply for {correlation_id} within {timeout_ms} ms")]
    Timeout {
        /// Exchange that timed out.
        correlation_id: CorrelationId,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// A reply arrived with a message type the pattern does not allow.
    #[error("unexpected {message_type} frame for {correlation_id}")]
    UnexpectedFrame {
        /// Exchange the frame matched.
        correlation_id: CorrelationId,
        /// Received tag.
        message_type: MessageType,
    },

    /// The address could not be turned into an endpoint.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Payload encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Frame serialization failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ErrorFrame> for ClientError {
    fn from(frame: ErrorFrame) -> Self {
        Self::Protocol(Box::new(frame))
    }
}
