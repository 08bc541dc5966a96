//! Pending-exchange tables of one connection.
//!
//! Request-response slots are one-shot and removed on first match. Stream
//! subscriptions stay until closed. Broadcast subscriptions are keyed by
//! route and fan out to every service subscribed to it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use plexus_core::{CorrelationId, ErrorFrame, MessageType, MessagingPattern, Payload};
use tokio::sync::oneshot;

/// How a pending request-response exchange ended.
#[derive(Debug)]
pub(crate) enum ReplyOutcome {
    Data(Payload),
    Error(ErrorFrame),
    Unexpected(MessageType),
}

/// Which request-response table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReplyKind {
    Plain,
    Ack,
}

/// Which stream table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamKind {
    Private,
    Shared,
}

/// Stream frame flavour handed to a subscription callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    InitialData,
    Data,
}

/// Registry table a messaging pattern resolves against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Table {
    Reply(ReplyKind),
    Stream(StreamKind),
    Broadcast,
}

impl From<MessagingPattern> for Table {
    fn from(pattern: MessagingPattern) -> Self {
        match pattern {
            MessagingPattern::RequestResponse => Self::Reply(ReplyKind::Plain),
            MessagingPattern::RequestResponseAck => Self::Reply(ReplyKind::Ack),
            MessagingPattern::PrivateStream => Self::Stream(StreamKind::Private),
            MessagingPattern::SharedStream => Self::Stream(StreamKind::Shared),
            MessagingPattern::Broadcast => Self::Broadcast,
        }
    }
}

pub(crate) type StreamHandler = Arc<Mutex<Box<dyn FnMut(StreamEvent, &Payload) + Send>>>;
pub(crate) type BroadcastHandler = Arc<Mutex<Box<dyn FnMut(&Payload) + Send>>>;

/// A request waiting for its reply.
pub(crate) struct PendingReply {
    pub service: String,
    tx: oneshot::Sender<ReplyOutcome>,
}

impl PendingReply {
    pub fn new(service: impl Into<String>, tx: oneshot::Sender<ReplyOutcome>) -> Self {
        Self {
            service: service.into(),
            tx,
        }
    }

    /// Complete the exchange. Returns `false` if the caller stopped waiting.
    pub fn resolve(self, outcome: ReplyOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// An open stream subscription.
pub(crate) struct StreamEntry {
    pub service: String,
    pub route: String,
    pub handler: StreamHandler,
}

struct BroadcastEntry {
    service: String,
    handler: BroadcastHandler,
}

#[derive(Default)]
pub(crate) struct PendingExchanges {
    replies: HashMap<CorrelationId, PendingReply>,
    ack_replies: HashMap<CorrelationId, PendingReply>,
    private_streams: HashMap<CorrelationId, StreamEntry>,
    shared_streams: HashMap<CorrelationId, StreamEntry>,
    broadcasts: HashMap<String, Vec<BroadcastEntry>>,
}

impl PendingExchanges {
    fn reply_table(&mut self, kind: ReplyKind) -> &mut HashMap<CorrelationId, PendingReply> {
        match kind {
            ReplyKind::Plain => &mut self.replies,
            ReplyKind::Ack => &mut self.ack_replies,
        }
    }

    fn stream_table(&mut self, kind: StreamKind) -> &mut HashMap<CorrelationId, StreamEntry> {
        match kind {
            StreamKind::Private => &mut self.private_streams,
            StreamKind::Shared => &mut self.shared_streams,
        }
    }

    // ─── Request-response ────────────────────────────────────────────────

    pub fn insert_reply(&mut self, kind: ReplyKind, id: CorrelationId, reply: PendingReply) {
        let _ = self.reply_table(kind).insert(id, reply);
    }

    /// Remove and return the slot for `id`; a second call yields `None`.
    pub fn take_reply(&mut self, kind: ReplyKind, id: &CorrelationId) -> Option<PendingReply> {
        self.reply_table(kind).remove(id)
    }

    // ─── Streams ─────────────────────────────────────────────────────────

    pub fn insert_stream(&mut self, kind: StreamKind, id: CorrelationId, entry: StreamEntry) {
        let _ = self.stream_table(kind).insert(id, entry);
    }

    pub fn remove_stream(&mut self, kind: StreamKind, id: &CorrelationId) -> Option<StreamEntry> {
        self.stream_table(kind).remove(id)
    }

    /// Handler for `id`, left in place.
    pub fn stream_handler(&mut self, kind: StreamKind, id: &CorrelationId) -> Option<StreamHandler> {
        self.stream_table(kind)
            .get(id)
            .map(|entry| Arc::clone(&entry.handler))
    }

    // ─── Broadcast ───────────────────────────────────────────────────────

    /// Subscribe `service` to `route`, replacing its previous callback.
    pub fn subscribe_broadcast(&mut self, route: &str, service: &str, handler: BroadcastHandler) {
        let entries = self.broadcasts.entry(route.to_owned()).or_default();
        if let Some(existing) = entries.iter_mut().find(|e| e.service == service) {
            existing.handler = handler;
        } else {
            entries.push(BroadcastEntry {
                service: service.to_owned(),
                handler,
            });
        }
    }

    /// Callbacks subscribed to `route`, in subscription order.
    pub fn broadcast_handlers(&self, route: &str) -> Vec<BroadcastHandler> {
        self.broadcasts
            .get(route)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.handler)).collect())
            .unwrap_or_default()
    }

    // ─── Whole table ─────────────────────────────────────────────────────

    /// Number of outstanding replies and open streams.
    pub fn len(&self) -> usize {
        self.replies.len()
            + self.ack_replies.len()
            + self.private_streams.len()
            + self.shared_streams.len()
    }

    /// Number of (route, service) broadcast subscriptions.
    pub fn broadcast_len(&self) -> usize {
        self.broadcasts.values().map(Vec::len).sum()
    }

    /// Empty every table, returning the old contents so the caller can drop
    /// them outside any lock.
    pub fn take_all(&mut self) -> Self {
        std::mem::take(self)
    }
}
