//! Provider-issued sessions and the events that announce them.
//!
//! A session is owned by the identity provider. The application only ever
//! holds a read-only cached copy, refreshed by session events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Identity;

/// Proof of authentication for one identity.
///
/// Tokens are kept so the provider client can refresh and revoke the
/// session; they are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated identity.
    identity: Identity,
    /// Bearer token presented to the provider.
    access_token: String,
    /// Token used to obtain a new access token.
    refresh_token: String,
    /// When the access token stops being accepted.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session from provider-issued values.
    #[must_use]
    pub fn new(
        identity: Identity,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Returns the authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns when the access token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the access token expires within `margin` from now.
    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A change announced on the provider's session event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was established (password sign-in, callback, another tab).
    SignedIn(Session),
    /// The session ended.
    SignedOut,
    /// The access token was renewed; the identity is unchanged.
    TokenRefreshed(Session),
}

impl SessionEvent {
    /// Returns the session the event leaves in place, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) => Some(session),
            Self::SignedOut => None,
        }
    }

    /// Returns the provider's name for the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybertest_lab_core::IdentityId;

    fn test_session(expires_at: DateTime<Utc>) -> Session {
        Session::new(
            Identity::new(IdentityId::new("user-1").expect("valid id"), "a@example.com"),
            "access-secret".to_string(),
            "refresh-secret".to_string(),
            expires_at,
        )
    }

    #[test]
    fn debug_redacts_tokens() {
        let session = test_session(Utc::now() + Duration::hours(1));
        let debug = format!("{session:?}");
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
        assert!(debug.contains("a@example.com"));
    }

    #[test]
    fn expires_within_margin() {
        let session = test_session(Utc::now() + Duration::seconds(5));
        assert!(session.expires_within(Duration::seconds(10)));
        assert!(!session.expires_within(Duration::zero()));
    }

    #[test]
    fn expired_session_expires_within_zero() {
        let session = test_session(Utc::now() - Duration::seconds(1));
        assert!(session.expires_within(Duration::zero()));
    }

    #[test]
    fn event_session_accessor() {
        let session = test_session(Utc::now() + Duration::hours(1));
        assert_eq!(
            SessionEvent::SignedIn(session.clone()).session(),
            Some(&session)
        );
        assert_eq!(
            SessionEvent::TokenRefreshed(session.clone()).session(),
            Some(&session)
        );
        assert_eq!(SessionEvent::SignedOut.session(), None);
    }

    #[test]
    fn event_names_match_provider() {
        assert_eq!(SessionEvent::SignedOut.name(), "SIGNED_OUT");
    }
}
