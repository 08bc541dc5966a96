//! Per-transport session state.

use std::fmt;

use plexus_core::SessionId;

/// Where the handshake of the current transport stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Transport open (or opening); waiting for the endpoint to start the handshake.
    Connecting,
    /// Session id adopted and credentials sent.
    AwaitingAuth,
    /// Endpoint accepted the credentials; services may be used.
    Initialized,
    /// No transport.
    Closed,
}

impl SessionState {
    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingAuth => "awaiting_auth",
            Self::Initialized => "initialized",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transport lifetime.
///
/// `epoch` increases with every transport the manager opens; service handles
/// remember the epoch they were created in and are rejected once it moves on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Session {
    pub epoch: u64,
    pub id: Option<SessionId>,
    pub state: SessionState,
}

impl Session {
    /// The state before the first transport opens.
    pub fn closed() -> Self {
        Self {
            epoch: 0,
            id: None,
            state: SessionState::Closed,
        }
    }

    /// Start the next session on a freshly opened transport.
    pub fn reopen(&mut self) -> u64 {
        self.epoch += 1;
        self.id = None;
        self.state = SessionState::Connecting;
        self.epoch
    }

    /// Adopt the endpoint-assigned id and wait for the auth verdict.
    pub fn begin_auth(&mut self, id: SessionId) {
        self.id = Some(id);
        self.state = SessionState::AwaitingAuth;
    }

    /// Handshake complete.
    pub fn initialize(&mut self) {
        self.state = SessionState::Initialized;
    }

    /// Transport gone. The id is kept for logging until the next reopen.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }
}
