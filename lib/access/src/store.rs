//! The session store.
//!
//! Owns the [`SessionSlot`] and is its only writer. Provider events, the
//! initial lookup and local sign-outs are queued and applied one at a time,
//! in arrival order. Observers run outside the lock after each applied
//! update, and may write back into the store: those writes are queued behind
//! the update being delivered. An observer that panics does not stall the
//! queue; the next write drains it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::provider::{IdentityProvider, SessionCallback, Subscription};
use crate::session::{Session, SessionEvent};
use crate::state::{SessionSlot, SessionSnapshot, SessionUpdate};
use crate::sync::lock;

/// Listener invoked with the snapshot after every applied update.
pub type SnapshotObserver = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Cached view of the provider's current session.
///
/// Cloning is cheap; clones share the same slot.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    slot: SessionSlot,
    queue: VecDeque<SessionUpdate>,
    draining: bool,
    started: bool,
    disposed: bool,
    observers: Vec<(u64, SnapshotObserver)>,
    next_observer: u64,
    subscription: Option<Subscription>,
}

impl SessionStore {
    /// Creates an unresolved store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the provider's session stream, then looks up the
    /// current session.
    ///
    /// Whichever arrives first ends loading. A failed lookup is logged and
    /// applied as "no session". Calling `start` twice, or after
    /// [`dispose`](Self::dispose), does nothing.
    pub async fn start(&self, provider: Arc<dyn IdentityProvider>) {
        {
            let mut state = lock(&self.inner.state);
            if state.started || state.disposed {
                return;
            }
            state.started = true;
        }

        let target = Arc::downgrade(&self.inner);
        let callback: SessionCallback = Arc::new(move |event: SessionEvent| {
            submit_weak(&target, SessionUpdate::Event(event));
        });
        let subscription = provider.on_session_change(callback);

        let stale = {
            let mut state = lock(&self.inner.state);
            if state.disposed {
                Some(subscription)
            } else {
                state.subscription = Some(subscription);
                None
            }
        };
        if let Some(subscription) = stale {
            subscription.unsubscribe();
            return;
        }

        let session = match provider.get_session().await {
            Ok(session) => session,
            Err(report) => {
                tracing::warn!(
                    error = %report.current_context(),
                    "session lookup failed, treating as signed out"
                );
                None
            }
        };
        submit(&self.inner, SessionUpdate::Lookup(session));
    }

    /// Registers an observer for applied updates.
    ///
    /// The observer is not called with the current snapshot; read
    /// [`snapshot`](Self::snapshot) for that.
    pub fn observe(&self, observer: SnapshotObserver) -> Subscription {
        let id = {
            let mut state = lock(&self.inner.state);
            let id = state.next_observer;
            state.next_observer += 1;
            state.observers.push((id, observer));
            id
        };

        let target = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = target.upgrade() {
                lock(&inner.state).observers.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.inner.state).slot.snapshot().clone()
    }

    /// Returns the cached session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        lock(&self.inner.state).slot.snapshot().session().cloned()
    }

    /// Applies a confirmed sign-out without waiting for the provider's echo.
    ///
    /// A lookup or token refresh still in flight is discarded when it lands,
    /// so it cannot bring the session back. Only a new sign-in does.
    pub fn clear_local(&self) {
        submit(&self.inner, SessionUpdate::LocalSignOut);
    }

    /// Resolves to "no session" when no provider could be constructed.
    pub fn resolve_unavailable(&self, reason: &str) {
        tracing::warn!(reason, "identity provider unavailable, treating as signed out");
        submit(&self.inner, SessionUpdate::Lookup(None));
    }

    /// Releases the provider subscription and ignores every later write.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        let subscription = {
            let mut state = lock(&self.inner.state);
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.queue.clear();
            state.observers.clear();
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        tracing::debug!("session store disposed");
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        lock(&self.inner.state).disposed
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("SessionStore")
            .field("snapshot", state.slot.snapshot())
            .field("started", &state.started)
            .field("disposed", &state.disposed)
            .field("observers", &state.observers.len())
            .finish()
    }
}

fn submit_weak(target: &Weak<StoreInner>, update: SessionUpdate) {
    match target.upgrade() {
        Some(inner) => submit(&inner, update),
        None => tracing::debug!(
            source = update.source().as_str(),
            "session store dropped, ignoring update"
        ),
    }
}

fn submit(inner: &StoreInner, update: SessionUpdate) {
    let mut state = lock(&inner.state);
    if state.disposed {
        tracing::debug!(
            source = update.source().as_str(),
            "session store disposed, ignoring update"
        );
        return;
    }
    state.queue.push_back(update);
    if state.draining {
        return;
    }
    state.draining = true;

    loop {
        if state.disposed {
            state.draining = false;
            return;
        }
        let Some(update) = state.queue.pop_front() else {
            state.draining = false;
            return;
        };

        let source = update.source();
        let applied = state.slot.apply(update);
        if applied.discarded {
            tracing::debug!(
                source = source.as_str(),
                "discarding session update that arrived after local sign-out"
            );
            continue;
        }
        tracing::debug!(
            source = source.as_str(),
            ended_loading = applied.ended_loading,
            changed = applied.changed,
            signed_in = state.slot.snapshot().session().is_some(),
            "applied session update"
        );

        let snapshot = state.slot.snapshot().clone();
        let observers: Vec<SnapshotObserver> = state
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        drop(state);

        {
            let _reset = DrainReset(inner);
            for observer in observers {
                observer(&snapshot);
            }
        }

        state = lock(&inner.state);
    }
}

/// Hands draining back if an observer unwinds, so the next submit drains
/// whatever is still queued.
struct DrainReset<'a>(&'a StoreInner);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(&self.0.state).draining = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::identity::Identity;
    use crate::testing::{FakeProvider, session_for};
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn recorder(store: &SessionStore) -> (Arc<Mutex<Vec<SessionSnapshot>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store.observe(Arc::new(move |snapshot: &SessionSnapshot| {
            lock(&sink).push(snapshot.clone());
        }));
        (seen, subscription)
    }

    fn emails(snapshots: &[SessionSnapshot]) -> Vec<Option<String>> {
        snapshots
            .iter()
            .map(|s| s.identity().map(|i| i.email().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn start_resolves_from_lookup() {
        let provider = Arc::new(FakeProvider::with_session(session_for("a@example.com")));
        let store = SessionStore::new();
        assert!(!store.snapshot().is_resolved());

        store.start(provider.clone()).await;

        let snapshot = store.snapshot();
        assert!(snapshot.is_resolved());
        assert_eq!(snapshot.identity().map(Identity::email), Some("a@example.com"));
        assert_eq!(provider.listener_count(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_resolves_signed_out() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_lookup(ProviderError::Network {
            reason: "offline".to_string(),
        });
        let store = SessionStore::new();

        store.start(provider).await;

        assert!(store.snapshot().is_resolved());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn event_before_lookup_ends_loading() {
        let provider = Arc::new(FakeProvider::new());
        let pending = provider.defer_lookup();
        let store = SessionStore::new();
        let (seen, _sub) = recorder(&store);

        let task = store.start(provider.clone());
        let emitter = async {
            tokio::task::yield_now().await;
            provider.emit(SessionEvent::SignedIn(session_for("a@example.com")));
            assert!(store.snapshot().is_resolved());
            pending.resolve(Ok(Some(session_for("b@example.com"))));
        };
        tokio::join!(task, emitter);

        assert_eq!(
            emails(&lock(&seen)),
            vec![
                Some("a@example.com".to_string()),
                Some("b@example.com".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn events_are_applied_in_order_without_coalescing() {
        let provider = Arc::new(FakeProvider::new());
        let store = SessionStore::new();
        store.start(provider.clone()).await;
        let (seen, _sub) = recorder(&store);

        provider.emit(SessionEvent::SignedIn(session_for("a@example.com")));
        provider.emit(SessionEvent::TokenRefreshed(session_for("a@example.com")));
        provider.emit(SessionEvent::SignedOut);
        provider.emit(SessionEvent::SignedOut);

        assert_eq!(
            emails(&lock(&seen)),
            vec![
                Some("a@example.com".to_string()),
                Some("a@example.com".to_string()),
                None,
                None
            ]
        );
    }

    #[tokio::test]
    async fn clear_local_signs_out_before_echo() {
        let provider = Arc::new(FakeProvider::with_session(session_for("a@example.com")));
        let store = SessionStore::new();
        store.start(provider).await;
        assert!(store.session().is_some());

        store.clear_local();

        assert!(store.snapshot().is_resolved());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn lookup_resolving_after_local_sign_out_does_not_restore_session() {
        let provider = Arc::new(FakeProvider::new());
        let pending = provider.defer_lookup();
        let store = SessionStore::new();
        let (seen, _sub) = recorder(&store);

        let task = store.start(provider.clone());
        let sign_out = async {
            tokio::task::yield_now().await;
            provider.emit(SessionEvent::SignedIn(session_for("a@example.com")));
            store.clear_local();
            pending.resolve(Ok(Some(session_for("a@example.com"))));
        };
        tokio::join!(task, sign_out);

        assert!(store.session().is_none());
        assert_eq!(
            emails(&lock(&seen)),
            vec![Some("a@example.com".to_string()), None]
        );
    }

    #[test]
    fn resolve_unavailable_ends_loading_signed_out() {
        let store = SessionStore::new();
        store.resolve_unavailable("missing provider url");
        assert!(store.snapshot().is_resolved());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn dispose_releases_subscription_and_ignores_late_events() {
        let provider = Arc::new(FakeProvider::new());
        let store = SessionStore::new();
        store.start(provider.clone()).await;
        let before = store.snapshot();

        store.dispose();
        assert!(store.is_disposed());
        assert_eq!(provider.listener_count(), 0);

        provider.emit_to_retained(SessionEvent::SignedIn(session_for("a@example.com")));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn late_lookup_after_dispose_is_ignored() {
        let provider = Arc::new(FakeProvider::new());
        let pending = provider.defer_lookup();
        let store = SessionStore::new();

        let task = store.start(provider.clone());
        let teardown = async {
            tokio::task::yield_now().await;
            store.dispose();
            pending.resolve(Ok(Some(session_for("a@example.com"))));
        };
        tokio::join!(task, teardown);

        assert!(!store.snapshot().is_resolved());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn start_after_dispose_does_not_subscribe() {
        let provider = Arc::new(FakeProvider::new());
        let store = SessionStore::new();
        store.dispose();

        store.start(provider.clone()).await;

        assert_eq!(provider.listener_count(), 0);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn start_twice_subscribes_once() {
        let provider = Arc::new(FakeProvider::new());
        let store = SessionStore::new();
        store.start(provider.clone()).await;
        store.start(provider.clone()).await;
        assert_eq!(provider.listener_count(), 1);
    }

    #[test]
    fn observer_writes_are_queued_behind_current_update() {
        let store = SessionStore::new();
        let writer = store.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.observe(Arc::new(move |snapshot: &SessionSnapshot| {
            lock(&sink).push(snapshot.session().is_some());
            if snapshot.session().is_some() {
                writer.clear_local();
            }
        }));

        submit(
            &store.inner,
            SessionUpdate::Event(SessionEvent::SignedIn(session_for("a@example.com"))),
        );

        assert_eq!(*lock(&seen), vec![true, false]);
        assert!(store.session().is_none());
    }

    #[test]
    fn panicking_observer_does_not_stall_later_updates() {
        let store = SessionStore::new();
        let armed = Arc::new(AtomicBool::new(true));
        let trigger = Arc::clone(&armed);
        let _sub = store.observe(Arc::new(move |_: &SessionSnapshot| {
            if trigger.swap(false, Ordering::SeqCst) {
                panic!("observer failed");
            }
        }));

        let writer = store.clone();
        let unwound = std::panic::catch_unwind(AssertUnwindSafe(|| {
            submit(
                &writer.inner,
                SessionUpdate::Event(SessionEvent::SignedIn(session_for("a@example.com"))),
            );
        }));
        assert!(unwound.is_err());
        assert!(store.session().is_some());

        store.clear_local();

        assert!(store.session().is_none());
        assert!(!lock(&store.inner.state).draining);
    }

    #[test]
    fn released_observer_is_not_called() {
        let store = SessionStore::new();
        let (seen, subscription) = recorder(&store);
        subscription.unsubscribe();

        store.clear_local();

        assert!(lock(&seen).is_empty());
    }
}
