//! Branded ID newtypes.
//!
//! Correlation ids tie replies and stream frames back to the exchange that
//! opened them; session ids are handed out by the endpoint during the
//! handshake. Both wrap a `String` so the wire stays a plain JSON string.
//!
//! Locally minted ids are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh ID (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifies one exchange (request, stream subscription, handshake step).
    CorrelationId
}

branded_id! {
    /// Session identifier assigned by the endpoint in `SESSION_INITIALIZING`.
    SessionId
}

impl From<SessionId> for CorrelationId {
    fn from(id: SessionId) -> Self {
        Self(id.0)
    }
}

impl From<CorrelationId> for SessionId {
    fn from(id: CorrelationId) -> Self {
        Self(id.0)
    }
}
