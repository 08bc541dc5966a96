//! Wire frames.
//!
//! Every frame is a JSON object tagged by `messageType`. Session frames
//! (handshake, auth, service creation, heartbeats) carry only the base fields;
//! application frames add the service, route and messaging pattern; error
//! frames are application frames with an error code and message instead of a
//! success payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::FrameError;
use crate::ids::CorrelationId;
use crate::payload::Payload;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// The `messageType` tag of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Endpoint opens the handshake and assigns the session id.
    SessionInitializing,
    /// Endpoint accepted the credentials.
    SessionInitialized,
    /// Client credentials.
    Auth,
    /// Client registers a named service.
    ServiceCreate,
    /// Liveness check (endpoint) or reply (client).
    Heartbeat,
    /// Application data.
    Data,
    /// First snapshot of a stream subscription.
    InitialData,
    /// Client acknowledgement of a request-response-ack reply.
    DataAck,
    /// Client closes a stream subscription.
    DataClose,
    /// Endpoint rejected an exchange.
    Error,
}

impl MessageType {
    /// Wire name of the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionInitializing => "SESSION_INITIALIZING",
            Self::SessionInitialized => "SESSION_INITIALIZED",
            Self::Auth => "AUTH",
            Self::ServiceCreate => "SERVICE_CREATE",
            Self::Heartbeat => "HEARTBEAT",
            Self::Data => "DATA",
            Self::InitialData => "INITIAL_DATA",
            Self::DataAck => "DATA_ACK",
            Self::DataClose => "DATA_CLOSE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an application frame relates to other frames with the same
/// correlation id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessagingPattern {
    /// One request, one reply.
    #[serde(rename = "RR")]
    RequestResponse,
    /// One request, one reply, then a client acknowledgement.
    #[serde(rename = "RRA")]
    RequestResponseAck,
    /// Per-client stream subscription.
    #[serde(rename = "PS")]
    PrivateStream,
    /// Stream subscription whose feed is shared between clients.
    #[serde(rename = "SS")]
    SharedStream,
    /// Route-wide fan-out with no subscription frame.
    #[serde(rename = "BC")]
    Broadcast,
}

impl MessagingPattern {
    /// Short wire name (`RR`, `RRA`, `PS`, `SS`, `BC`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestResponse => "RR",
            Self::RequestResponseAck => "RRA",
            Self::PrivateStream => "PS",
            Self::SharedStream => "SS",
            Self::Broadcast => "BC",
        }
    }
}

impl fmt::Display for MessagingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Base frame: correlation id and payload only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFrame {
    /// Correlation id (the session id for handshake frames).
    pub correlation_id: CorrelationId,
    /// Encoded body.
    #[serde(default)]
    pub data: Payload,
}

impl SessionFrame {
    /// Build a session frame.
    #[must_use]
    pub fn new(correlation_id: impl Into<CorrelationId>, data: impl Into<Payload>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data: data.into(),
        }
    }
}

/// Frame addressed to a service route under a messaging pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFrame {
    /// Exchange the frame belongs to.
    pub correlation_id: CorrelationId,
    /// Owning service.
    #[serde(default)]
    pub service_name: String,
    /// Route within the service.
    #[serde(default)]
    pub route: String,
    /// Pattern that decides which pending table the frame resolves against.
    pub messaging_pattern: MessagingPattern,
    /// Encoded body.
    #[serde(default)]
    pub data: Payload,
}

impl ApplicationFrame {
    /// Build an application frame.
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        service_name: impl Into<String>,
        route: impl Into<String>,
        messaging_pattern: MessagingPattern,
        data: impl Into<Payload>,
    ) -> Self {
        Self {
            correlation_id,
            service_name: service_name.into(),
            route: route.into(),
            messaging_pattern,
            data: data.into(),
        }
    }
}

/// Endpoint rejection of an exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame {
    /// Exchange that failed.
    pub correlation_id: CorrelationId,
    /// Owning service.
    #[serde(default)]
    pub service_name: String,
    /// Route within the service.
    #[serde(default)]
    pub route: String,
    /// Pattern of the failed exchange.
    pub messaging_pattern: MessagingPattern,
    /// Endpoint-defined error code.
    #[serde(default)]
    pub error_code: i32,
    /// Human-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} error {}",
            self.service_name, self.route, self.error_code
        )?;
        if let Some(msg) = &self.error_msg {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame envelope
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded wire frame, tagged by `messageType`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frame {
    /// Handshake start; correlation id is the new session id.
    SessionInitializing(SessionFrame),
    /// Handshake complete.
    SessionInitialized(SessionFrame),
    /// Credentials, correlated by session id.
    Auth(SessionFrame),
    /// Service registration.
    ServiceCreate(SessionFrame),
    /// Heartbeat request or reply.
    Heartbeat(SessionFrame),
    /// Application data.
    Data(ApplicationFrame),
    /// Initial stream snapshot.
    InitialData(ApplicationFrame),
    /// Reply acknowledgement.
    DataAck(ApplicationFrame),
    /// Stream close.
    DataClose(ApplicationFrame),
    /// Exchange failure.
    Error(ErrorFrame),
    /// Any tag this client does not know.
    #[serde(other)]
    Unknown,
}

impl Frame {
    /// The frame's tag, or `None` for [`Frame::Unknown`].
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        Some(match self {
            Self::SessionInitializing(_) => MessageType::SessionInitializing,
            Self::SessionInitialized(_) => MessageType::SessionInitialized,
            Self::Auth(_) => MessageType::Auth,
            Self::ServiceCreate(_) => MessageType::ServiceCreate,
            Self::Heartbeat(_) => MessageType::Heartbeat,
            Self::Data(_) => MessageType::Data,
            Self::InitialData(_) => MessageType::InitialData,
            Self::DataAck(_) => MessageType::DataAck,
            Self::DataClose(_) => MessageType::DataClose,
            Self::Error(_) => MessageType::Error,
            Self::Unknown => return None,
        })
    }

    /// Correlation id of the frame, if it has a known shape.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::SessionInitializing(f)
            | Self::SessionInitialized(f)
            | Self::Auth(f)
            | Self::ServiceCreate(f)
            | Self::Heartbeat(f) => Some(&f.correlation_id),
            Self::Data(f) | Self::InitialData(f) | Self::DataAck(f) | Self::DataClose(f) => {
                Some(&f.correlation_id)
            }
            Self::Error(f) => Some(&f.correlation_id),
            Self::Unknown => None,
        }
    }

    /// Serialize to the JSON text sent over the transport.
    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }

    /// Parse a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(FrameError::Malformed)
    }
}
