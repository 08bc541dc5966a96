//! Heartbeat replies.
//!
//! The endpoint pings each service; the client notifies the service's
//! listeners and answers immediately. The client never starts a heartbeat.

use chrono::Utc;
use plexus_core::{Codec, CodecError, Frame, Heartbeat, JsonCodec, SessionFrame};
use tracing::{debug, warn};

use crate::connection::Shared;

pub(crate) fn handle(shared: &Shared, frame: &SessionFrame) {
    let heartbeat = match Codec::<Heartbeat>::decode(&JsonCodec, frame.data.as_bytes()) {
        Ok(heartbeat) => heartbeat,
        Err(e) => {
            warn!(correlation_id = %frame.correlation_id, error = %e, "dropping undecodable heartbeat");
            return;
        }
    };

    let listeners = shared
        .state
        .lock()
        .services
        .get(&heartbeat.service_name)
        .map(|entry| entry.listeners.clone());
    let Some(listeners) = listeners else {
        warn!(
            service = %heartbeat.service_name,
            id = heartbeat.id,
            "heartbeat for unknown service"
        );
        return;
    };

    debug!(service = %heartbeat.service_name, id = heartbeat.id, "heartbeat");
    for listener in &listeners {
        listener.on_heartbeat_received();
    }

    let sent = reply_frame(&heartbeat, Utc::now().timestamp_millis())
        .map_err(crate::error::ClientError::from)
        .and_then(|reply| shared.send(&reply));
    if let Err(e) = sent {
        warn!(service = %heartbeat.service_name, error = %e, "failed to answer heartbeat");
    }
}

/// The reply to `heartbeat`: correlated by the heartbeat id, stamped `now_ms`.
pub(crate) fn reply_frame(heartbeat: &Heartbeat, now_ms: i64) -> Result<Frame, CodecError> {
    let body = Heartbeat {
        service_name: heartbeat.service_name.clone(),
        id: heartbeat.id,
        timestamp: now_ms,
    };
    let data = Codec::<Heartbeat>::encode(&JsonCodec, &body)?;
    Ok(Frame::Heartbeat(SessionFrame::new(heartbeat.id.to_string(), data)))
}
