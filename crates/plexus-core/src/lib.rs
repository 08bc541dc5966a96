//! # plexus-core
//!
//! Wire vocabulary shared by the Plexus session client.
//!
//! - **Branded IDs**: [`CorrelationId`] and [`SessionId`] newtypes
//! - **Frames**: the serde-tagged [`Frame`] envelope and its pattern/type enums
//! - **Payloads**: [`Payload`] bytes carried base64-encoded on the wire
//! - **Codecs**: the [`Codec`] boundary with JSON, protobuf, string and byte codecs
//! - **Control messages**: heartbeat, service-create and auth-token bodies
//! - **Logging**: subscriber setup plus a capture layer for tests

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod payload;

pub use codec::{BytesCodec, Codec, JsonCodec, ProtobufCodec, StringCodec};
pub use errors::{CodecError, FrameError};
pub use frame::{ApplicationFrame, ErrorFrame, Frame, MessageType, MessagingPattern, SessionFrame};
pub use ids::{CorrelationId, SessionId};
pub use messages::{AuthToken, Heartbeat, ServiceCreate};
pub use payload::Payload;
