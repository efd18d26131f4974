//! The access guard: session plus policy, projected to one of four states.

use std::sync::Arc;

use crate::identity::Identity;
use crate::policy::AccessPolicy;
use crate::provider::Subscription;
use crate::state::SessionSnapshot;
use crate::store::SessionStore;

/// What the gate renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    /// Neither the lookup nor the first event has arrived.
    Loading,
    /// Resolved without a session.
    Unauthenticated,
    /// Signed in, but the email is not on the allow-list.
    Unauthorized(Identity),
    /// Signed in and allowed.
    Authorized(Identity),
}

impl AccessState {
    /// Projects a snapshot through the policy.
    ///
    /// Pure: the same snapshot and policy always give the same state.
    #[must_use]
    pub fn evaluate(snapshot: &SessionSnapshot, policy: &AccessPolicy) -> Self {
        if !snapshot.is_resolved() {
            return Self::Loading;
        }
        match snapshot.identity() {
            None => Self::Unauthenticated,
            Some(identity) if policy.decide(Some(identity)) => {
                Self::Authorized(identity.clone())
            }
            Some(identity) => Self::Unauthorized(identity.clone()),
        }
    }

    /// Returns the signed-in identity, authorized or not.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Unauthorized(identity) | Self::Authorized(identity) => Some(identity),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    /// Returns true if protected content may be shown.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// Returns a short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized(_) => "unauthorized",
            Self::Authorized(_) => "authorized",
        }
    }
}

/// Listener invoked with the re-evaluated state after every store update.
pub type AccessListener = Arc<dyn Fn(&AccessState) + Send + Sync>;

/// Composes a [`SessionStore`] with an [`AccessPolicy`].
///
/// The guard holds no state of its own; every read re-evaluates the store's
/// current snapshot.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    store: SessionStore,
    policy: AccessPolicy,
}

impl AccessGuard {
    /// Creates a guard over `store`.
    #[must_use]
    pub fn new(store: SessionStore, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the current access state.
    #[must_use]
    pub fn current(&self) -> AccessState {
        AccessState::evaluate(&self.store.snapshot(), &self.policy)
    }

    /// Calls `listener` with the re-evaluated state after every applied
    /// update, including updates that leave the state unchanged.
    pub fn watch(&self, listener: AccessListener) -> Subscription {
        let policy = self.policy.clone();
        self.store.observe(Arc::new(move |snapshot: &SessionSnapshot| {
            let state = AccessState::evaluate(snapshot, &policy);
            tracing::debug!(state = state.name(), "access re-evaluated");
            listener(&state);
        }))
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}
