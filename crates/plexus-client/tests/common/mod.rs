//! Shared harness: a connection manager wired to the in-memory transport,
//! with the test playing the endpoint.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use plexus_client::transport::{MemoryAcceptor, MemoryConnector, MemoryPeer, memory_transport};
use plexus_client::{
    AuthToken, ClientConfig, ConnectionManager, Endpoint, Service, ServiceListener,
    SessionListener,
};
use plexus_core::frame::{ApplicationFrame, Frame, MessagingPattern, SessionFrame};
use plexus_core::{Codec, Heartbeat, JsonCodec, Payload, ServiceCreate};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn endpoint() -> Endpoint {
    Endpoint::parse("memory://endpoint", "ws").unwrap()
}

pub fn credentials() -> AuthToken {
    AuthToken::username_password("alice", "secret")
}

/// Manager plus the endpoint side of its transport.
pub struct Harness {
    pub manager: Arc<ConnectionManager>,
    pub connector: MemoryConnector,
    pub acceptor: MemoryAcceptor,
}

pub fn start(config: ClientConfig) -> Harness {
    let (connector, acceptor) = memory_transport();
    let manager = ConnectionManager::connect(
        endpoint(),
        Arc::new(connector.clone()),
        Arc::new(credentials()),
        config,
    );
    Harness {
        manager,
        connector,
        acceptor,
    }
}

pub async fn accept(acceptor: &mut MemoryAcceptor) -> MemoryPeer {
    timeout(TIMEOUT, acceptor.accept())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

pub async fn next_frame(peer: &mut MemoryPeer) -> Frame {
    timeout(TIMEOUT, peer.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("client closed the transport")
}

/// Let the driver run until it has nothing left to do.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Run the endpoint half of the handshake and return the `AUTH` frame.
pub async fn handshake(peer: &mut MemoryPeer, session_id: &str) -> SessionFrame {
    assert!(peer.send(&Frame::SessionInitializing(SessionFrame::new(
        session_id,
        Payload::empty()
    ))));
    let auth = match next_frame(peer).await {
        Frame::Auth(frame) => frame,
        other => panic!("expected AUTH, got {other:?}"),
    };
    assert!(peer.send(&Frame::SessionInitialized(SessionFrame::new(
        session_id,
        Payload::empty()
    ))));
    auth
}

/// A manager with an initialized session.
pub async fn connected(config: ClientConfig) -> (Harness, MemoryPeer) {
    let mut harness = start(config);
    let mut peer = accept(&mut harness.acceptor).await;
    let _ = handshake(&mut peer, "S1").await;
    let session = timeout(TIMEOUT, harness.manager.wait_for_session())
        .await
        .expect("timed out waiting for session")
        .unwrap();
    assert_eq!(session.as_str(), "S1");
    (harness, peer)
}

/// Create a service and consume its `SERVICE_CREATE` frame.
pub async fn create_service<C>(
    manager: &ConnectionManager,
    peer: &mut MemoryPeer,
    name: &str,
    codec: C,
) -> Service<C>
where
    C: Send + Sync + 'static,
{
    let service = manager.create_service(name, codec, None).unwrap();
    match next_frame(peer).await {
        Frame::ServiceCreate(frame) => {
            let body: ServiceCreate = JsonCodec.decode(frame.data.as_bytes()).unwrap();
            assert_eq!(body.service_name, name);
            assert_eq!(body.correlation_id, frame.correlation_id);
        }
        other => panic!("expected SERVICE_CREATE, got {other:?}"),
    }
    service
}

pub fn expect_data(frame: Frame) -> ApplicationFrame {
    match frame {
        Frame::Data(frame) => frame,
        other => panic!("expected DATA, got {other:?}"),
    }
}

pub fn json_payload<T: Serialize>(value: &T) -> Payload {
    Payload::from(serde_json::to_vec(value).unwrap())
}

/// An application frame answering `request` with `data`.
pub fn answer(request: &ApplicationFrame, data: impl Into<Payload>) -> ApplicationFrame {
    ApplicationFrame::new(
        request.correlation_id.clone(),
        request.service_name.clone(),
        request.route.clone(),
        request.messaging_pattern,
        data,
    )
}

pub fn broadcast_frame(service: &str, route: &str, data: impl Into<Payload>) -> Frame {
    Frame::Data(ApplicationFrame::new(
        plexus_core::CorrelationId::new(),
        service,
        route,
        MessagingPattern::Broadcast,
        data,
    ))
}

pub fn heartbeat_request(service: &str, id: i64) -> Frame {
    let body = Heartbeat {
        service_name: service.to_owned(),
        id,
        timestamp: 1_700_000_000_000,
    };
    Frame::Heartbeat(SessionFrame::new(id.to_string(), json_payload(&body)))
}

/// Send a heartbeat for `service` and collect every frame the client sent
/// before answering it. The outbound queue is FIFO, so this drains
/// everything caused by frames delivered earlier.
pub async fn sync_point(peer: &mut MemoryPeer, service: &str) -> Vec<Frame> {
    const MARKER_ID: i64 = 999_999;
    assert!(peer.send(&heartbeat_request(service, MARKER_ID)));
    let mut before = Vec::new();
    loop {
        match next_frame(peer).await {
            Frame::Heartbeat(frame) if frame.correlation_id.as_str() == "999999" => return before,
            other => before.push(other),
        }
    }
}

// ─── Listeners ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Initialized,
    Destroyed { will_reconnect: bool },
}

/// Forwards session callbacks into a channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelListener {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SessionListener for ChannelListener {
    fn on_session_initialized(&self) {
        let _ = self.tx.send(SessionEvent::Initialized);
    }

    fn on_session_destroyed(&self, will_reconnect: bool) {
        let _ = self.tx.send(SessionEvent::Destroyed { will_reconnect });
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("listener dropped")
}

/// Counts heartbeats.
#[derive(Default)]
pub struct HeartbeatCounter {
    count: AtomicUsize,
}

impl HeartbeatCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ServiceListener for HeartbeatCounter {
    fn on_heartbeat_received(&self) {
        let _ = self.count.fetch_add(1, Ordering::SeqCst);
    }
}
