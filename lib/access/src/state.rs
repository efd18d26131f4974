//! The session slot and its reducer.
//!
//! Three sources write the current session: the initial lookup, the provider's
//! event stream, and a confirmed local sign-out. All of them go through
//! [`SessionSlot::apply`], so there is exactly one state-setting path.
//!
//! Rules:
//! - the slot starts unresolved;
//! - the first update of any kind resolves it (first writer ends loading);
//! - every update replaces the session (last writer wins thereafter);
//! - nothing is merged or reordered;
//! - after a local sign-out, lookups and token refreshes still in flight are
//!   discarded until the provider reports a new sign-in.

use crate::identity::Identity;
use crate::session::{Session, SessionEvent};

/// Where an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// The one-shot "current session" lookup at start-up.
    Lookup,
    /// An event from the provider's session stream.
    Event,
    /// A sign-out the provider confirmed, applied without waiting for its echo.
    LocalSignOut,
}

impl UpdateSource {
    /// Returns a short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Event => "event",
            Self::LocalSignOut => "local_sign_out",
        }
    }
}

/// One write to the session slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Result of the initial lookup. Failed lookups arrive as `Lookup(None)`.
    Lookup(Option<Session>),
    /// A provider event.
    Event(SessionEvent),
    /// Local sign-out.
    LocalSignOut,
}

impl SessionUpdate {
    /// Returns where the update came from.
    #[must_use]
    pub fn source(&self) -> UpdateSource {
        match self {
            Self::Lookup(_) => UpdateSource::Lookup,
            Self::Event(_) => UpdateSource::Event,
            Self::LocalSignOut => UpdateSource::LocalSignOut,
        }
    }

    /// Returns true for writes that only restate a session started earlier.
    fn restates_earlier_session(&self) -> bool {
        matches!(
            self,
            Self::Lookup(_) | Self::Event(SessionEvent::TokenRefreshed(_))
        )
    }

    fn into_session(self) -> Option<Session> {
        match self {
            Self::Lookup(session) => session,
            Self::Event(SessionEvent::SignedIn(session))
            | Self::Event(SessionEvent::TokenRefreshed(session)) => Some(session),
            Self::Event(SessionEvent::SignedOut) | Self::LocalSignOut => None,
        }
    }
}

/// Read-only view of the slot handed to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    resolved: bool,
    session: Option<Session>,
}

impl SessionSnapshot {
    /// Returns true once any update has been applied.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Returns the cached session.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the cached session's identity.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }
}

/// What applying an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// This update was the first one and ended loading.
    pub ended_loading: bool,
    /// The snapshot differs from before.
    pub changed: bool,
    /// The update arrived after a local sign-out and was not applied.
    pub discarded: bool,
}

/// The single-writer session slot.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    snapshot: SessionSnapshot,
    resolved_by: Option<UpdateSource>,
    applied: u64,
    signed_out_locally: bool,
}

impl SessionSlot {
    /// Creates an unresolved slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one update.
    pub fn apply(&mut self, update: SessionUpdate) -> Applied {
        if self.signed_out_locally && update.restates_earlier_session() {
            return Applied {
                ended_loading: false,
                changed: false,
                discarded: true,
            };
        }
        match &update {
            SessionUpdate::LocalSignOut => self.signed_out_locally = true,
            SessionUpdate::Event(SessionEvent::SignedIn(_)) => self.signed_out_locally = false,
            _ => {}
        }

        let source = update.source();
        let next = SessionSnapshot {
            resolved: true,
            session: update.into_session(),
        };

        let ended_loading = !self.snapshot.resolved;
        if ended_loading {
            self.resolved_by = Some(source);
        }
        let changed = next != self.snapshot;
        self.snapshot = next;
        self.applied += 1;

        Applied {
            ended_loading,
            changed,
            discarded: false,
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    /// Returns which source ended loading, once resolved.
    #[must_use]
    pub fn resolved_by(&self) -> Option<UpdateSource> {
        self.resolved_by
    }

    /// Returns how many updates have been applied.
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }
}
