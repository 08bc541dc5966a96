//! Inbound frame dispatch.
//!
//! Runs on the driver task, one frame at a time. The state lock is released
//! before any user callback or listener runs.

use plexus_core::{
    ApplicationFrame, AuthToken, Codec, CorrelationId, ErrorFrame, Frame, JsonCodec, MessageType,
    MessagingPattern, SessionFrame, SessionId,
};
use tracing::{debug, info, warn};

use crate::connection::Shared;
use crate::heartbeat;
use crate::registry::{ReplyOutcome, StreamEvent, Table};

/// Decode `text` and route it.
pub(crate) fn dispatch(shared: &Shared, text: &str) {
    let frame = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, len = text.len(), "dropping malformed frame");
            return;
        }
    };
    let message_type = frame.message_type();
    debug!(message_type = ?message_type, "frame in");

    match frame {
        Frame::SessionInitializing(frame) => session_initializing(shared, frame),
        Frame::SessionInitialized(_) => session_initialized(shared),
        Frame::Heartbeat(frame) => heartbeat::handle(shared, &frame),
        Frame::Data(frame) => application(shared, MessageType::Data, frame),
        Frame::InitialData(frame) => application(shared, MessageType::InitialData, frame),
        Frame::Error(frame) => error(shared, frame),
        Frame::Auth(_) | Frame::ServiceCreate(_) | Frame::DataAck(_) | Frame::DataClose(_) => {
            warn!(message_type = ?message_type, "unhandled frame");
        }
        Frame::Unknown => warn!("unhandled frame with unknown message type"),
    }
}

// ─── Handshake ───────────────────────────────────────────────────────────────

fn session_initializing(shared: &Shared, frame: SessionFrame) {
    let session_id = SessionId::from(frame.correlation_id);
    let token = shared.auth.auth_token();
    let data = match Codec::<AuthToken>::encode(&JsonCodec, &token) {
        Ok(data) => data,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "failed to encode auth token");
            return;
        }
    };
    let auth = Frame::Auth(SessionFrame::new(session_id.clone(), data));

    let sent = {
        let mut state = shared.state.lock();
        state.session.begin_auth(session_id.clone());
        shared.publish(&state);
        state.send(&auth)
    };
    match sent {
        Ok(()) => info!(session_id = %session_id, "session initializing, credentials sent"),
        Err(e) => warn!(session_id = %session_id, error = %e, "failed to send credentials"),
    }
}

fn session_initialized(shared: &Shared) {
    let (listeners, session_id) = {
        let mut state = shared.state.lock();
        state.session.initialize();
        shared.publish(&state);
        (state.session_listeners.clone(), state.session.id.clone())
    };
    info!(
        session_id = session_id.as_deref().unwrap_or("-"),
        listeners = listeners.len(),
        "session initialized"
    );
    for listener in &listeners {
        listener.on_session_initialized();
    }
}

// ─── Application frames ──────────────────────────────────────────────────────

fn application(shared: &Shared, message_type: MessageType, frame: ApplicationFrame) {
    let ApplicationFrame {
        correlation_id,
        route,
        messaging_pattern: pattern,
        data,
        ..
    } = frame;
    match Table::from(pattern) {
        Table::Reply(kind) => {
            let pending = shared.state.lock().exchanges.take_reply(kind, &correlation_id);
            let Some(reply) = pending else {
                unmatched(&correlation_id, message_type, pattern);
                return;
            };
            let outcome = if message_type == MessageType::Data {
                ReplyOutcome::Data(data)
            } else {
                ReplyOutcome::Unexpected(message_type)
            };
            debug!(correlation_id = %correlation_id, service = %reply.service, "reply matched");
            if !reply.resolve(outcome) {
                debug!(%correlation_id, "reply arrived after the caller stopped waiting");
            }
        }
        Table::Stream(kind) => {
            let handler = shared
                .state
                .lock()
                .exchanges
                .stream_handler(kind, &correlation_id);
            let Some(handler) = handler else {
                unmatched(&correlation_id, message_type, pattern);
                return;
            };
            let event = if message_type == MessageType::InitialData {
                StreamEvent::InitialData
            } else {
                StreamEvent::Data
            };
            let mut callback = handler.lock();
            (*callback)(event, &data);
        }
        Table::Broadcast => {
            if message_type != MessageType::Data {
                debug!(%route, %message_type, "ignoring non-DATA broadcast frame");
                return;
            }
            let handlers = shared.state.lock().exchanges.broadcast_handlers(&route);
            if handlers.is_empty() {
                debug!(%route, "broadcast with no subscribers");
            }
            for handler in handlers {
                let mut callback = handler.lock();
                (*callback)(&data);
            }
        }
    }
}

fn error(shared: &Shared, frame: ErrorFrame) {
    let pattern = frame.messaging_pattern;
    match Table::from(pattern) {
        Table::Reply(kind) => {
            let pending = shared
                .state
                .lock()
                .exchanges
                .take_reply(kind, &frame.correlation_id);
            let Some(reply) = pending else {
                unmatched(&frame.correlation_id, MessageType::Error, pattern);
                return;
            };
            info!(
                correlation_id = %frame.correlation_id,
                service = %reply.service,
                route = %frame.route,
                error_code = frame.error_code,
                "exchange rejected by endpoint"
            );
            let _ = reply.resolve(ReplyOutcome::Error(frame));
        }
        Table::Stream(kind) => {
            let known = shared
                .state
                .lock()
                .exchanges
                .stream_handler(kind, &frame.correlation_id)
                .is_some();
            if known {
                debug!(
                    correlation_id = %frame.correlation_id,
                    error_code = frame.error_code,
                    "ignoring error frame on stream"
                );
            } else {
                unmatched(&frame.correlation_id, MessageType::Error, pattern);
            }
        }
        Table::Broadcast => {
            debug!(
                route = %frame.route,
                error_code = frame.error_code,
                "ignoring error frame on broadcast route"
            );
        }
    }
}

fn unmatched(correlation_id: &CorrelationId, message_type: MessageType, pattern: MessagingPattern) {
    warn!(
        correlation_id = %correlation_id,
        message_type = %message_type,
        pattern = %pattern,
        "no pending exchange for correlation id"
    );
}
