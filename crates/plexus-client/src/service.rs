//! Service handles and the five messaging patterns.
//!
//! A [`Service`] is a named channel multiplexed over its manager's connection.
//! Handles are cheap to clone and remember the session they were created in;
//! once that session is torn down every operation fails with
//! [`ClientError::ServiceDiscarded`] and the service must be recreated.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use plexus_core::{ApplicationFrame, Codec, CorrelationId, Frame, MessagingPattern, Payload};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::connection::Shared;
use crate::error::{ClientError, Result};
use crate::listener::ServiceListener;
use crate::registry::{
    BroadcastHandler, PendingReply, ReplyKind, ReplyOutcome, StreamEntry, StreamEvent,
    StreamHandler, StreamKind,
};

impl ReplyKind {
    fn pattern(self) -> MessagingPattern {
        match self {
            Self::Plain => MessagingPattern::RequestResponse,
            Self::Ack => MessagingPattern::RequestResponseAck,
        }
    }
}

impl StreamKind {
    fn pattern(self) -> MessagingPattern {
        match self {
            Self::Private => MessagingPattern::PrivateStream,
            Self::Shared => MessagingPattern::SharedStream,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public helper types
// ─────────────────────────────────────────────────────────────────────────────

/// Callback pair for a stream subscription.
pub struct StreamCallbacks<T> {
    initial_data: Box<dyn FnMut(T) + Send>,
    data: Box<dyn FnMut(T) + Send>,
}

impl<T> StreamCallbacks<T> {
    /// `initial_data` receives `INITIAL_DATA` snapshots, `data` every update.
    pub fn new<I, D>(initial_data: I, data: D) -> Self
    where
        I: FnMut(T) + Send + 'static,
        D: FnMut(T) + Send + 'static,
    {
        Self {
            initial_data: Box::new(initial_data),
            data: Box::new(data),
        }
    }

    /// Route snapshots and updates to the same callback.
    pub fn unified<F>(callback: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let callback = Arc::new(Mutex::new(callback));
        let for_initial = Arc::clone(&callback);
        Self::new(
            move |value| {
                let mut f = for_initial.lock();
                (*f)(value);
            },
            move |value| {
                let mut f = callback.lock();
                (*f)(value);
            },
        )
    }
}

/// Future of a request-response exchange.
///
/// The request is already on the wire when this is returned; dropping the
/// future only discards the reply.
pub struct ReplyFuture<T> {
    correlation_id: CorrelationId,
    inner: BoxFuture<'static, Result<T>>,
}

impl<T> ReplyFuture<T> {
    /// Correlation id of the exchange.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl<T> Future for ReplyFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for ReplyFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyFuture")
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

/// Sends the `DATA_ACK` for one request-response-ack exchange.
pub struct AckHandle {
    shared: Arc<Shared>,
    epoch: u64,
    frame: ApplicationFrame,
}

impl AckHandle {
    /// Correlation id being acknowledged.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.frame.correlation_id
    }

    /// Send the acknowledgement: the original request, same correlation id.
    pub fn ack(self) -> Result<()> {
        let state = self.shared.state.lock();
        state.check_service(&self.frame.service_name, self.epoch)?;
        state.send(&Frame::DataAck(self.frame.clone()))?;
        drop(state);
        debug!(
            service = %self.frame.service_name,
            route = %self.frame.route,
            correlation_id = %self.frame.correlation_id,
            "reply acknowledged"
        );
        Ok(())
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("correlation_id", &self.frame.correlation_id)
            .finish_non_exhaustive()
    }
}

/// A decoded request-response-ack reply that still owes the endpoint an ack.
#[derive(Debug)]
pub struct Acknowledgeable<T> {
    response: T,
    ack: AckHandle,
}

impl<T> Acknowledgeable<T> {
    /// The decoded reply.
    pub fn response(&self) -> &T {
        &self.response
    }

    /// Acknowledge and return the reply.
    pub fn ack(self) -> Result<T> {
        self.ack.ack()?;
        Ok(self.response)
    }

    /// Split into the reply and an ack handle to send later.
    pub fn into_parts(self) -> (T, AckHandle) {
        (self.response, self.ack)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one named service of a connection manager.
pub struct Service<C> {
    shared: Arc<Shared>,
    name: Arc<str>,
    epoch: u64,
    codec: Arc<C>,
}

impl<C> Clone for Service<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            name: Arc::clone(&self.name),
            epoch: self.epoch,
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C> fmt::Debug for Service<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("endpoint", &self.shared.endpoint)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<C> Service<C>
where
    C: Send + Sync + 'static,
{
    pub(crate) fn new(shared: Arc<Shared>, name: &str, epoch: u64, codec: C) -> Self {
        Self {
            shared,
            name: Arc::from(name),
            epoch,
            codec: Arc::new(codec),
        }
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Codec bound to this handle.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Whether the session this handle belongs to is still live.
    pub fn is_active(&self) -> bool {
        self.shared
            .state
            .lock()
            .check_service(&self.name, self.epoch)
            .is_ok()
    }

    /// Attach another heartbeat listener.
    pub fn add_listener(&self, listener: Arc<dyn ServiceListener>) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_service(&self.name, self.epoch)?;
        if let Some(entry) = state.services.get_mut(&*self.name) {
            entry.listeners.push(listener);
        }
        Ok(())
    }

    // ─── Request-response ────────────────────────────────────────────────

    /// Send `request` on `route` and return a future for the decoded reply.
    ///
    /// An `ERROR` reply fails the future with [`ClientError::Protocol`]; a
    /// dropped connection fails it with [`ClientError::ConnectionLost`].
    pub fn request_response<Req, Resp>(
        &self,
        route: &str,
        request: &Req,
    ) -> Result<ReplyFuture<Resp>>
    where
        C: Codec<Req> + Codec<Resp>,
        Resp: Send + 'static,
    {
        let data = <C as Codec<Req>>::encode(&self.codec, request)?;
        let (correlation_id, rx) = self.send_request(ReplyKind::Plain, route, data.into())?;
        let codec = Arc::clone(&self.codec);
        let id = correlation_id.clone();
        let exchange = async move {
            let payload = await_reply(&id, rx).await?;
            Ok(<C as Codec<Resp>>::decode(&codec, payload.as_bytes())?)
        };
        Ok(self.reply_future(ReplyKind::Plain, correlation_id, exchange))
    }

    /// Like [`request_response`](Self::request_response), but the reply must
    /// be acknowledged through the returned [`Acknowledgeable`].
    pub fn request_response_ack<Req, Resp>(
        &self,
        route: &str,
        request: &Req,
    ) -> Result<ReplyFuture<Acknowledgeable<Resp>>>
    where
        C: Codec<Req> + Codec<Resp>,
        Resp: Send + 'static,
    {
        let data: Payload = <C as Codec<Req>>::encode(&self.codec, request)?.into();
        let (correlation_id, rx) = self.send_request(ReplyKind::Ack, route, data.clone())?;
        let ack = AckHandle {
            shared: Arc::clone(&self.shared),
            epoch: self.epoch,
            frame: ApplicationFrame::new(
                correlation_id.clone(),
                &*self.name,
                route,
                MessagingPattern::RequestResponseAck,
                data,
            ),
        };
        let codec = Arc::clone(&self.codec);
        let id = correlation_id.clone();
        let exchange = async move {
            let payload = await_reply(&id, rx).await?;
            let response = <C as Codec<Resp>>::decode(&codec, payload.as_bytes())?;
            Ok(Acknowledgeable { response, ack })
        };
        Ok(self.reply_future(ReplyKind::Ack, correlation_id, exchange))
    }

    fn send_request(
        &self,
        kind: ReplyKind,
        route: &str,
        data: Payload,
    ) -> Result<(CorrelationId, oneshot::Receiver<ReplyOutcome>)> {
        let correlation_id = CorrelationId::new();
        let pattern = kind.pattern();
        let frame = Frame::Data(ApplicationFrame::new(
            correlation_id.clone(),
            &*self.name,
            route,
            pattern,
            data,
        ));
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.state.lock();
            state.check_service(&self.name, self.epoch)?;
            state.send(&frame)?;
            state.exchanges.insert_reply(
                kind,
                correlation_id.clone(),
                PendingReply::new(&*self.name, tx),
            );
        }
        debug!(service = %self.name, route, %correlation_id, %pattern, "request sent");
        Ok((correlation_id, rx))
    }

    fn reply_future<T, F>(
        &self,
        kind: ReplyKind,
        correlation_id: CorrelationId,
        exchange: F,
    ) -> ReplyFuture<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let Some(timeout_ms) = self.shared.config.request_timeout_ms else {
            return ReplyFuture {
                correlation_id,
                inner: exchange.boxed(),
            };
        };
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        let shared = Arc::downgrade(&self.shared);
        let id = correlation_id.clone();
        let inner = async move {
            if let Ok(result) = tokio::time::timeout_at(deadline, exchange).await {
                return result;
            }
            if let Some(shared) = shared.upgrade() {
                let _ = shared.state.lock().exchanges.take_reply(kind, &id);
            }
            warn!(correlation_id = %id, timeout_ms, "request timed out");
            Err(ClientError::Timeout {
                correlation_id: id,
                timeout_ms,
            })
        }
        .boxed();
        ReplyFuture {
            correlation_id,
            inner,
        }
    }

    // ─── Streams ─────────────────────────────────────────────────────────

    /// Open a private stream on `route`. Returns the subscription id to pass
    /// to [`private_stream_close`](Self::private_stream_close).
    pub fn private_stream<Sub, T>(
        &self,
        route: &str,
        subscription: &Sub,
        callbacks: StreamCallbacks<T>,
    ) -> Result<CorrelationId>
    where
        C: Codec<Sub> + Codec<T>,
        T: 'static,
    {
        self.open_stream(StreamKind::Private, route, subscription, callbacks)
    }

    /// Close a private stream. The local subscription is removed even if the
    /// close frame cannot be sent.
    pub fn private_stream_close<Sub>(
        &self,
        route: &str,
        correlation_id: &CorrelationId,
        subscription: &Sub,
    ) -> Result<()>
    where
        C: Codec<Sub>,
    {
        self.close_stream(StreamKind::Private, route, correlation_id, subscription)
    }

    /// Open a shared stream on `route`.
    pub fn shared_stream<Sub, T>(
        &self,
        route: &str,
        subscription: &Sub,
        callbacks: StreamCallbacks<T>,
    ) -> Result<CorrelationId>
    where
        C: Codec<Sub> + Codec<T>,
        T: 'static,
    {
        self.open_stream(StreamKind::Shared, route, subscription, callbacks)
    }

    /// Close a shared stream.
    pub fn shared_stream_close<Sub>(
        &self,
        route: &str,
        correlation_id: &CorrelationId,
        subscription: &Sub,
    ) -> Result<()>
    where
        C: Codec<Sub>,
    {
        self.close_stream(StreamKind::Shared, route, correlation_id, subscription)
    }

    fn open_stream<Sub, T>(
        &self,
        kind: StreamKind,
        route: &str,
        subscription: &Sub,
        callbacks: StreamCallbacks<T>,
    ) -> Result<CorrelationId>
    where
        C: Codec<Sub> + Codec<T>,
        T: 'static,
    {
        let data = <C as Codec<Sub>>::encode(&self.codec, subscription)?;
        let correlation_id = CorrelationId::new();
        let pattern = kind.pattern();
        let frame = Frame::Data(ApplicationFrame::new(
            correlation_id.clone(),
            &*self.name,
            route,
            pattern,
            data,
        ));

        let codec = Arc::clone(&self.codec);
        let service = Arc::clone(&self.name);
        let stream_route = route.to_owned();
        let StreamCallbacks {
            mut initial_data,
            mut data,
        } = callbacks;
        let handler: StreamHandler = Arc::new(Mutex::new(Box::new(
            move |event: StreamEvent, payload: &Payload| {
                match <C as Codec<T>>::decode(&codec, payload.as_bytes()) {
                    Ok(value) => match event {
                        StreamEvent::InitialData => initial_data(value),
                        StreamEvent::Data => data(value),
                    },
                    Err(e) => warn!(
                        %service,
                        route = %stream_route,
                        error = %e,
                        "dropping undecodable stream payload"
                    ),
                }
            },
        )));

        {
            let mut state = self.shared.state.lock();
            state.check_service(&self.name, self.epoch)?;
            state.send(&frame)?;
            state.exchanges.insert_stream(
                kind,
                correlation_id.clone(),
                StreamEntry {
                    service: self.name.to_string(),
                    route: route.to_owned(),
                    handler,
                },
            );
        }
        debug!(service = %self.name, route, %correlation_id, %pattern, "stream opened");
        Ok(correlation_id)
    }

    fn close_stream<Sub>(
        &self,
        kind: StreamKind,
        route: &str,
        correlation_id: &CorrelationId,
        subscription: &Sub,
    ) -> Result<()>
    where
        C: Codec<Sub>,
    {
        let pattern = kind.pattern();
        let removed = self
            .shared
            .state
            .lock()
            .exchanges
            .remove_stream(kind, correlation_id);
        match &removed {
            Some(entry) => debug!(
                service = %entry.service,
                route = %entry.route,
                %correlation_id,
                "stream subscription removed"
            ),
            None => debug!(service = %self.name, route, %correlation_id, "closing unknown stream"),
        }
        drop(removed);

        let data = <C as Codec<Sub>>::encode(&self.codec, subscription)?;
        let frame = Frame::DataClose(ApplicationFrame::new(
            correlation_id.clone(),
            &*self.name,
            route,
            pattern,
            data,
        ));
        {
            let state = self.shared.state.lock();
            state.check_service(&self.name, self.epoch)?;
            state.send(&frame)?;
        }
        debug!(service = %self.name, route, %correlation_id, %pattern, "stream closed");
        Ok(())
    }

    // ─── Broadcast ───────────────────────────────────────────────────────

    /// Receive every `DATA` frame broadcast on `route`.
    ///
    /// Subscribing the same service to the same route again replaces the
    /// callback. Nothing is sent to the endpoint.
    pub fn broadcast<T, F>(&self, route: &str, mut callback: F) -> Result<()>
    where
        C: Codec<T>,
        T: 'static,
        F: FnMut(T) + Send + 'static,
    {
        let codec = Arc::clone(&self.codec);
        let service = Arc::clone(&self.name);
        let broadcast_route = route.to_owned();
        let handler: BroadcastHandler = Arc::new(Mutex::new(Box::new(move |payload: &Payload| {
            match <C as Codec<T>>::decode(&codec, payload.as_bytes()) {
                Ok(value) => callback(value),
                Err(e) => warn!(
                    %service,
                    route = %broadcast_route,
                    error = %e,
                    "dropping undecodable broadcast payload"
                ),
            }
        })));

        let mut state = self.shared.state.lock();
        state.check_service(&self.name, self.epoch)?;
        state.exchanges.subscribe_broadcast(route, &self.name, handler);
        drop(state);
        debug!(service = %self.name, route, "broadcast subscribed");
        Ok(())
    }
}

async fn await_reply(
    correlation_id: &CorrelationId,
    rx: oneshot::Receiver<ReplyOutcome>,
) -> Result<Payload> {
    match rx.await {
        Ok(ReplyOutcome::Data(payload)) => Ok(payload),
        Ok(ReplyOutcome::Error(frame)) => Err(frame.into()),
        Ok(ReplyOutcome::Unexpected(message_type)) => Err(ClientError::UnexpectedFrame {
            correlation_id: correlation_id.clone(),
            message_type,
        }),
        Err(_) => Err(ClientError::ConnectionLost),
    }
}
