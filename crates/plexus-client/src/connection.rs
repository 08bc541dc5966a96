//! Connection manager.
//!
//! One driver task per manager owns the transport. It opens a connection,
//! pumps outbound frames from an unbounded queue and dispatches inbound
//! frames one at a time, then tears the session down when the transport
//! closes and, unless the owner closed the manager, reconnects after a fixed
//! delay.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use plexus_core::{Codec, CorrelationId, Frame, JsonCodec, ServiceCreate, SessionFrame, SessionId};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::directory::DirectoryLink;
use crate::dispatch;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};
use crate::listener::{AuthTokenProvider, ServiceListener, SessionListener};
use crate::registry::PendingExchanges;
use crate::service::Service;
use crate::session::{Session, SessionState};
use crate::transport::{Connector, FrameSink, FrameStream};

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

/// A registered service and its listeners.
pub(crate) struct ServiceEntry {
    pub listeners: Vec<Arc<dyn ServiceListener>>,
}

/// Everything the driver, dispatch and service handles touch.
///
/// Never held across an await or while calling user code.
pub(crate) struct ConnectionState {
    pub session: Session,
    pub services: HashMap<String, ServiceEntry>,
    pub exchanges: PendingExchanges,
    pub session_listeners: Vec<Arc<dyn SessionListener>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl ConnectionState {
    /// Queue a frame for the driver to write.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let tx = self.outbound.as_ref().ok_or(ClientError::NotConnected)?;
        let text = frame.to_json()?;
        tx.send(text).map_err(|_| ClientError::NotConnected)
    }

    /// Whether `service` is still registered in session `epoch`.
    pub fn check_service(&self, service: &str, epoch: u64) -> Result<()> {
        if self.session.epoch == epoch
            && self.session.is_open()
            && self.services.contains_key(service)
        {
            Ok(())
        } else {
            Err(ClientError::ServiceDiscarded {
                service: service.to_owned(),
            })
        }
    }
}

#[derive(Clone, Debug)]
struct Status {
    state: SessionState,
    session_id: Option<SessionId>,
    terminated: bool,
}

pub(crate) struct Shared {
    pub endpoint: Endpoint,
    pub config: ClientConfig,
    pub auth: Arc<dyn AuthTokenProvider>,
    pub state: Mutex<ConnectionState>,
    status: watch::Sender<Status>,
    runtime: Handle,
}

impl Shared {
    /// Queue a frame for the driver to write.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        self.state.lock().send(frame)
    }

    /// Broadcast the session snapshot to `wait_for_session` callers.
    pub fn publish(&self, state: &ConnectionState) {
        let _ = self.status.send_replace(Status {
            state: state.session.state,
            session_id: state.session.id.clone(),
            terminated: false,
        });
    }

    fn open_session(&self, outbound: mpsc::UnboundedSender<String>) -> u64 {
        let mut state = self.state.lock();
        let epoch = state.session.reopen();
        state.outbound = Some(outbound);
        self.publish(&state);
        epoch
    }

    fn terminate(&self) {
        self.status.send_modify(|status| {
            status.state = SessionState::Closed;
            status.terminated = true;
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionManager
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the connection to one endpoint and the services multiplexed over it.
///
/// Dropping the last handle closes the manager.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _driver: JoinHandle<()>,
}

impl ConnectionManager {
    /// Start a manager outside any directory. Must be called inside a Tokio runtime.
    pub fn connect(
        endpoint: Endpoint,
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthTokenProvider>,
        config: ClientConfig,
    ) -> Arc<Self> {
        Self::spawn(endpoint, connector, auth, config, None)
    }

    pub(crate) fn spawn(
        endpoint: Endpoint,
        connector: Arc<dyn Connector>,
        auth: Arc<dyn AuthTokenProvider>,
        config: ClientConfig,
        link: Option<DirectoryLink>,
    ) -> Arc<Self> {
        let runtime = Handle::current();
        let (status, _) = watch::channel(Status {
            state: SessionState::Closed,
            session_id: None,
            terminated: false,
        });
        let shared = Arc::new(Shared {
            endpoint,
            config,
            auth,
            state: Mutex::new(ConnectionState {
                session: Session::closed(),
                services: HashMap::new(),
                exchanges: PendingExchanges::default(),
                session_listeners: Vec::new(),
                outbound: None,
            }),
            status,
            runtime: runtime.clone(),
        });
        let cancel = CancellationToken::new();
        let driver = runtime.spawn(drive(
            Arc::clone(&shared),
            connector,
            cancel.clone(),
            link,
        ));
        Arc::new(Self {
            shared,
            cancel,
            _driver: driver,
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Endpoint this manager connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Current handshake state.
    pub fn session_state(&self) -> SessionState {
        self.shared.state.lock().session.state
    }

    /// Id of the current session, once the endpoint assigned one.
    pub fn session_id(&self) -> Option<SessionId> {
        let state = self.shared.state.lock();
        if state.session.is_open() {
            state.session.id.clone()
        } else {
            None
        }
    }

    /// Names of the services registered in the current session, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.state.lock().services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Outstanding request-response exchanges plus open stream subscriptions.
    pub fn pending_exchanges(&self) -> usize {
        self.shared.state.lock().exchanges.len()
    }

    /// Number of (route, service) broadcast subscriptions.
    pub fn broadcast_subscriptions(&self) -> usize {
        self.shared.state.lock().exchanges.broadcast_len()
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Register a session listener.
    ///
    /// If the session is already initialized the listener is notified on a
    /// separate task rather than inline.
    pub fn add_session_listener(&self, listener: Arc<dyn SessionListener>) {
        let initialized = {
            let mut state = self.shared.state.lock();
            state.session_listeners.push(Arc::clone(&listener));
            state.session.state == SessionState::Initialized
        };
        if initialized {
            let _ = self.shared.runtime.spawn(async move {
                listener.on_session_initialized();
            });
        }
    }

    /// Return a handle to service `name`, registering it with the endpoint
    /// first if this session has not seen it yet.
    ///
    /// Repeated calls send nothing and only attach `listener`. Each handle
    /// carries its own codec.
    pub fn create_service<C>(
        &self,
        name: &str,
        codec: C,
        listener: Option<Arc<dyn ServiceListener>>,
    ) -> Result<Service<C>>
    where
        C: Send + Sync + 'static,
    {
        let epoch = {
            let mut state = self.shared.state.lock();
            if !state.session.is_open() {
                return Err(ClientError::NotConnected);
            }
            if let Some(entry) = state.services.get_mut(name) {
                entry.listeners.extend(listener);
                debug!(service = name, "service already registered");
            } else {
                let correlation_id = CorrelationId::new();
                let body = ServiceCreate {
                    correlation_id: correlation_id.clone(),
                    service_name: name.to_owned(),
                };
                let data = Codec::<ServiceCreate>::encode(&JsonCodec, &body)?;
                state.send(&Frame::ServiceCreate(SessionFrame::new(correlation_id, data)))?;
                let _ = state.services.insert(
                    name.to_owned(),
                    ServiceEntry {
                        listeners: listener.into_iter().collect(),
                    },
                );
                info!(endpoint = %self.shared.endpoint, service = name, "service created");
            }
            state.session.epoch
        };
        Ok(Service::new(Arc::clone(&self.shared), name, epoch, codec))
    }

    /// Wait until the current (or next) session is initialized.
    ///
    /// Fails with [`ClientError::ConnectionClosed`] once the manager stopped.
    pub async fn wait_for_session(&self) -> Result<SessionId> {
        let mut rx = self.shared.status.subscribe();
        loop {
            {
                let status = rx.borrow_and_update();
                if status.terminated {
                    return Err(ClientError::ConnectionClosed);
                }
                if let (SessionState::Initialized, Some(id)) = (status.state, &status.session_id) {
                    return Ok(id.clone());
                }
            }
            rx.changed()
                .await
                .map_err(|_| ClientError::ConnectionClosed)?;
        }
    }

    /// Wait until the driver task has stopped after [`close`](Self::close).
    pub async fn closed(&self) {
        let mut rx = self.shared.status.subscribe();
        let _ = rx.wait_for(|status| status.terminated).await;
    }

    /// Close the transport for good and leave the directory. If a transport
    /// is open, listeners see `on_session_destroyed(false)`.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!(endpoint = %self.shared.endpoint, "closing connection");
        }
        self.cancel.cancel();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.session_state())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

#[instrument(name = "connection", skip_all, fields(endpoint = %shared.endpoint))]
async fn drive(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
    link: Option<DirectoryLink>,
) {
    loop {
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connector.connect(&shared.endpoint) => result,
        };
        match connected {
            Ok((sink, stream)) => run_session(&shared, sink, stream, &cancel).await,
            Err(e) => warn!(error = %e, "connect attempt failed"),
        }
        if cancel.is_cancelled() {
            break;
        }
        teardown(&shared, true);

        info!(
            delay_ms = shared.config.reconnect_delay_ms,
            "reconnecting after delay"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(shared.config.reconnect_delay()) => {}
        }
    }

    // Closing during the reconnect delay has no session left to destroy.
    let open = shared.state.lock().session.is_open();
    if open {
        teardown(&shared, false);
    }
    if let Some(link) = link {
        link.release(&shared);
    }
    shared.terminate();
    info!("connection manager stopped");
}

async fn run_session(
    shared: &Shared,
    mut sink: Box<dyn FrameSink>,
    mut stream: Box<dyn FrameStream>,
    cancel: &CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let epoch = shared.open_session(tx);
    info!(epoch, "transport open, waiting for handshake");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                while let Ok(text) = rx.try_recv() {
                    if sink.send(text).await.is_err() {
                        break;
                    }
                }
                if let Err(e) = sink.close().await {
                    debug!(error = %e, "transport close failed");
                }
                info!("transport closed by owner");
                break;
            }
            Some(text) = rx.recv() => {
                debug!(len = text.len(), "frame out");
                if let Err(e) = sink.send(text).await {
                    warn!(error = %e, "transport write failed");
                    break;
                }
            }
            inbound = stream.recv() => match inbound {
                Some(Ok(text)) => dispatch::dispatch(shared, &text),
                Some(Err(e)) => {
                    warn!(error = %e, "transport read failed");
                    break;
                }
                None => {
                    info!("transport closed by endpoint");
                    break;
                }
            },
        }
    }
}

/// Close the session: drop every service and pending exchange, then tell the
/// listeners.
fn teardown(shared: &Shared, will_reconnect: bool) {
    let (listeners, services, exchanges, session_id) = {
        let mut state = shared.state.lock();
        state.session.close();
        state.outbound = None;
        let services = std::mem::take(&mut state.services);
        let exchanges = state.exchanges.take_all();
        shared.publish(&state);
        (
            state.session_listeners.clone(),
            services,
            exchanges,
            state.session.id.clone(),
        )
    };
    info!(
        session_id = session_id.as_deref().unwrap_or("-"),
        services = services.len(),
        pending = exchanges.len(),
        will_reconnect,
        "session destroyed"
    );
    drop(services);
    drop(exchanges);
    for listener in &listeners {
        listener.on_session_destroyed(will_reconnect);
    }
}
