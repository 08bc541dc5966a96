//! JSON bodies of the session control frames.
//!
//! These are carried inside a frame's `data` payload, not at the top level.

use serde::{Deserialize, Serialize};

use crate::ids::CorrelationId;

/// Body of a `HEARTBEAT` frame, in both directions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Service the heartbeat is addressed to.
    pub service_name: String,
    /// Endpoint-chosen sequence id; echoed back as the reply's correlation id.
    pub id: i64,
    /// Milliseconds since the Unix epoch at the sender.
    pub timestamp: i64,
}

/// Body of a `SERVICE_CREATE` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCreate {
    /// Same id as the enclosing frame.
    pub correlation_id: CorrelationId,
    /// Name of the service being registered.
    pub service_name: String,
}

/// Credentials sent in the `AUTH` frame.
///
/// Serialized untagged: the endpoint tells the variants apart by their fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthToken {
    /// Plain username and password.
    UsernamePassword {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// Signed JSON web token.
    Jws {
        /// Compact JWS serialization.
        #[serde(rename = "jwsToken")]
        jws_token: String,
    },
}

impl AuthToken {
    /// Username/password credentials.
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    /// JWS credentials.
    pub fn jws(token: impl Into<String>) -> Self {
        Self::Jws {
            jws_token: token.into(),
        }
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Jws { .. } => f
                .debug_struct("Jws")
                .field("jws_token", &"[REDACTED]")
                .finish(),
        }
    }
}
