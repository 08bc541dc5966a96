//! In-process transport.
//!
//! [`memory_transport`] returns a connector for the client and an acceptor
//! that plays the endpoint: every `connect` hands the acceptor a
//! [`MemoryPeer`] holding the other ends of the channel pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use plexus_core::Frame;
use tokio::sync::mpsc;

use super::{Connector, FrameSink, FrameStream, TransportHalves};
use crate::endpoint::Endpoint;
use crate::error::TransportError;

/// Create a connected connector/acceptor pair.
pub fn memory_transport() -> (MemoryConnector, MemoryAcceptor) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            accept_tx,
            refusing: Arc::new(AtomicBool::new(false)),
        },
        MemoryAcceptor { accept_rx },
    )
}

/// Client side: opens in-process transports.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

impl MemoryConnector {
    /// Make subsequent connect attempts fail (or succeed again).
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportHalves, TransportError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            });
        }
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            endpoint: endpoint.clone(),
            to_client: Some(to_client),
            from_client,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "no acceptor".into(),
            })?;
        Ok((
            Box::new(MemorySink {
                tx: Some(client_tx),
            }),
            Box::new(MemoryFrames { rx: client_rx }),
        ))
    }
}

/// Endpoint side: yields one peer per accepted connection.
#[derive(Debug)]
pub struct MemoryAcceptor {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// A connection that is already waiting, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }
}

/// Endpoint side of one in-process connection.
#[derive(Debug)]
pub struct MemoryPeer {
    endpoint: Endpoint,
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Endpoint the client connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Push raw text to the client. Returns `false` once either side closed.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Push a frame to the client. Returns `false` once either side closed.
    pub fn send(&self, frame: &Frame) -> bool {
        match frame.to_json() {
            Ok(text) => self.send_text(text),
            Err(_) => false,
        }
    }

    /// Next raw text from the client; `None` once the client closed.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame from the client; `None` once the client closed or on
    /// unparseable text.
    pub async fn recv(&mut self) -> Option<Frame> {
        let text = self.recv_text().await?;
        Frame::from_json(&text).ok()
    }

    /// A frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        let text = self.from_client.try_recv().ok()?;
        Frame::from_json(&text).ok()
    }

    /// Drop the connection from the endpoint side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

struct MemoryFrames {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryFrames {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}
