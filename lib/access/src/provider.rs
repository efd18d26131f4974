//! The identity provider seam.
//!
//! Everything the access-control subsystem knows about authentication goes
//! through [`IdentityProvider`]. Credential storage, password hashing, token
//! issuance and transport all live behind it.

use async_trait::async_trait;
use rootcause::prelude::Report;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::callback::CallbackTokens;
use crate::error::ProviderError;
use crate::session::{Session, SessionEvent};
use crate::sync::lock;

/// Listener invoked for every session event, in emission order.
pub type SessionCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Client for an external identity provider.
///
/// Futures are not required to be `Send`: in the browser they wrap `fetch`
/// and are driven by the single-threaded event loop.
#[async_trait(?Send)]
pub trait IdentityProvider: Send + Sync {
    /// Returns the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>>;

    /// Registers a listener for session events.
    ///
    /// The listener stays registered until the returned subscription is
    /// released or dropped.
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;

    /// Signs in with email and password.
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Report<ProviderError>>;

    /// Registers a new account. Returns `None` when the provider requires
    /// email confirmation before issuing a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Session>, Report<ProviderError>>;

    /// Ends the current session at the provider.
    async fn sign_out(&self) -> Result<(), Report<ProviderError>>;

    /// Completes an out-of-band handoff from fragment tokens.
    ///
    /// Providers that pick the tokens up on their own can rely on the default,
    /// which simply asks for the current session.
    async fn exchange_callback(
        &self,
        tokens: &CallbackTokens,
    ) -> Result<Option<Session>, Report<ProviderError>> {
        let _ = tokens;
        self.get_session().await
    }
}

/// Handle for a registered session listener.
///
/// Releasing is idempotent: `unsubscribe` and `Drop` share one release hook
/// that runs at most once.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wraps the hook that deregisters the listener.
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Deregisters the listener now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Fan-out of session events to registered listeners.
///
/// Provider clients own one of these and call [`emit`](Self::emit) whenever
/// their session changes. Listeners are invoked synchronously, in
/// registration order, outside the registry lock.
#[derive(Clone, Default)]
pub struct SessionBroadcast {
    inner: Arc<Mutex<Listeners>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, SessionCallback)>,
}

impl SessionBroadcast {
    /// Creates an empty broadcast.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, callback: SessionCallback) -> Subscription {
        let id = {
            let mut listeners = lock(&self.inner);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, callback));
            id
        };

        let registry: Weak<Mutex<Listeners>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock(&registry).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Delivers an event to every current listener.
    pub fn emit(&self, event: &SessionEvent) {
        let callbacks: Vec<SessionCallback> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::debug!(
            event = event.name(),
            listeners = callbacks.len(),
            "emitting session event"
        );

        for callback in callbacks {
            callback(event.clone());
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

impl fmt::Debug for SessionBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBroadcast")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, SessionCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: SessionCallback = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn emit_reaches_every_listener() {
        let broadcast = SessionBroadcast::new();
        let (a, callback_a) = counter();
        let (b, callback_b) = counter();
        let _sub_a = broadcast.subscribe(callback_a);
        let _sub_b = broadcast.subscribe(callback_b);

        broadcast.emit(&SessionEvent::SignedOut);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broadcast = SessionBroadcast::new();
        let (count, callback) = counter();
        let subscription = broadcast.subscribe(callback);
        assert_eq!(broadcast.listener_count(), 1);

        subscription.unsubscribe();
        broadcast.emit(&SessionEvent::SignedOut);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(broadcast.listener_count(), 0);
    }

    #[test]
    fn dropping_subscription_releases_listener() {
        let broadcast = SessionBroadcast::new();
        let (count, callback) = counter();
        drop(broadcast.subscribe(callback));

        broadcast.emit(&SessionEvent::SignedOut);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_outliving_broadcast_is_harmless() {
        let broadcast = SessionBroadcast::new();
        let (_count, callback) = counter();
        let subscription = broadcast.subscribe(callback);
        drop(broadcast);
        subscription.unsubscribe();
    }

    #[test]
    fn listeners_can_subscribe_during_emit() {
        let broadcast = SessionBroadcast::new();
        let inner = broadcast.clone();
        let late = Arc::new(Mutex::new(Vec::new()));
        let late_subs = Arc::clone(&late);
        let _sub = broadcast.subscribe(Arc::new(move |_| {
            let (_, callback) = counter();
            lock(&late_subs).push(inner.subscribe(callback));
        }));

        broadcast.emit(&SessionEvent::SignedOut);

        assert_eq!(broadcast.listener_count(), 2);
    }
}
