//! Callbacks the connection manager and services notify.

use plexus_core::AuthToken;

/// Observes session lifecycle transitions of one connection manager.
pub trait SessionListener: Send + Sync {
    /// The handshake completed; services may be (re)created now.
    fn on_session_initialized(&self) {}

    /// The transport closed and every service was discarded.
    ///
    /// `will_reconnect` is `false` only when the owner closed the manager.
    fn on_session_destroyed(&self, will_reconnect: bool) {
        let _ = will_reconnect;
    }
}

/// Observes one service.
pub trait ServiceListener: Send + Sync {
    /// A heartbeat for the service arrived; the reply is sent right after.
    fn on_heartbeat_received(&self) {}
}

/// Supplies the credentials sent in the `AUTH` frame.
///
/// Asked once per handshake, so rotating tokens are picked up on reconnect.
pub trait AuthTokenProvider: Send + Sync {
    /// Credentials for the next handshake.
    fn auth_token(&self) -> AuthToken;
}

impl AuthTokenProvider for AuthToken {
    fn auth_token(&self) -> AuthToken {
        self.clone()
    }
}

impl<F> AuthTokenProvider for F
where
    F: Fn() -> AuthToken + Send + Sync,
{
    fn auth_token(&self) -> AuthToken {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn static_token_provider_returns_clone() {
        let token = AuthToken::username_password("u", "p");
        assert_eq!(token.auth_token(), token);
    }

    #[test]
    fn closure_provider_is_asked_each_time() {
        let calls = AtomicUsize::new(0);
        let provider = || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            AuthToken::jws(format!("token-{n}"))
        };
        assert_eq!(provider.auth_token(), AuthToken::jws("token-0"));
        assert_eq!(provider.auth_token(), AuthToken::jws("token-1"));
    }

    #[test]
    fn default_listener_methods_are_noops() {
        struct Quiet;
        impl SessionListener for Quiet {}
        impl ServiceListener for Quiet {}
        Quiet.on_session_initialized();
        Quiet.on_session_destroyed(true);
        Quiet.on_heartbeat_received();
    }
}
