//! # plexus-client
//!
//! Client runtime that multiplexes many named services over one
//! authenticated WebSocket session per endpoint.
//!
//! - [`ClientDirectory`] hands out one [`ConnectionManager`] per endpoint
//! - [`ConnectionManager`] runs the handshake, dispatches inbound frames,
//!   answers heartbeats and reconnects after unexpected closes
//! - [`Service`] exposes request-response, request-response-ack, private and
//!   shared streams, and broadcast subscriptions
//! - [`transport`] defines the transport boundary with WebSocket and
//!   in-memory implementations

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod directory;
mod dispatch;
pub mod endpoint;
pub mod error;
mod heartbeat;
pub mod listener;
mod registry;
pub mod service;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use connection::ConnectionManager;
pub use directory::ClientDirectory;
pub use endpoint::Endpoint;
pub use error::{ClientError, ConfigError, Result, TransportError};
pub use listener::{AuthTokenProvider, ServiceListener, SessionListener};
pub use service::{AckHandle, Acknowledgeable, ReplyFuture, Service, StreamCallbacks};
pub use session::SessionState;

pub use plexus_core::{
    AuthToken, BytesCodec, Codec, CodecError, CorrelationId, ErrorFrame, JsonCodec, SessionId,
    StringCodec,
};
