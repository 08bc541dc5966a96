//! Transport boundary.
//!
//! A [`Connector`] opens one duplex text channel to an endpoint and splits it
//! into a [`FrameSink`] and a [`FrameStream`]. Transports deliver in order and
//! at most once; they never retry on their own.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::TransportError;

pub use memory::{MemoryAcceptor, MemoryConnector, MemoryPeer, memory_transport};
pub use websocket::WebSocketConnector;

/// Write half of an open transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the transport. Further sends fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an open transport.
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound text frame; `None` once the transport is closed.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;
}

/// Both halves of a freshly opened transport.
pub type TransportHalves = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportHalves, TransportError>;
}
