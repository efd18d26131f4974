//! In-memory test doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::DateTime;
use cybertest_lab_core::IdentityId;
use rootcause::prelude::Report;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::callback::CallbackTokens;
use crate::error::ProviderError;
use crate::identity::Identity;
use crate::navigation::{Navigator, Redirect};
use crate::provider::{IdentityProvider, SessionBroadcast, SessionCallback, Subscription};
use crate::session::{Session, SessionEvent};
use crate::sync::lock;

pub(crate) fn identity_for(email: &str) -> Identity {
    Identity::new(
        IdentityId::new(format!("id-{email}")).expect("valid id"),
        email,
    )
}

pub(crate) fn session_for(email: &str) -> Session {
    Session::new(
        identity_for(email),
        format!("access-{email}"),
        format!("refresh-{email}"),
        DateTime::from_timestamp(4_102_444_800, 0).expect("valid timestamp"),
    )
}

/// Resolves a deferred provider call.
pub(crate) struct Pending<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Pending<T> {
    pub(crate) fn resolve(self, value: T) {
        let _ = self.sender.send(value);
    }
}

enum Reply<T> {
    Ready(T),
    Deferred(oneshot::Receiver<T>),
}

impl<T: Clone> Reply<T> {
    fn take(slot: &Mutex<Reply<T>>, fallback: T) -> Reply<T> {
        let mut guard = lock(slot);
        match std::mem::replace(&mut *guard, Reply::Ready(fallback)) {
            Reply::Ready(value) => {
                *guard = Reply::Ready(value.clone());
                Reply::Ready(value)
            }
            deferred => deferred,
        }
    }

    async fn wait(self) -> Result<T, ProviderError> {
        match self {
            Reply::Ready(value) => Ok(value),
            Reply::Deferred(receiver) => receiver.await.map_err(|_| ProviderError::Network {
                reason: "request abandoned".to_string(),
            }),
        }
    }
}

type Lookup = Result<Option<Session>, ProviderError>;
type SignOut = Result<(), ProviderError>;

/// Scriptable identity provider.
///
/// Sign-out never echoes a `SignedOut` event on its own; tests emit it
/// explicitly to control its timing.
pub(crate) struct FakeProvider {
    broadcast: SessionBroadcast,
    retained: Mutex<Vec<SessionCallback>>,
    lookup: Mutex<Reply<Lookup>>,
    sign_out: Mutex<Reply<SignOut>>,
    exchange: Mutex<Option<Lookup>>,
    sign_in: Mutex<Option<Result<Session, ProviderError>>>,
    sign_up: Mutex<Option<Lookup>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self {
            broadcast: SessionBroadcast::new(),
            retained: Mutex::new(Vec::new()),
            lookup: Mutex::new(Reply::Ready(Ok(None))),
            sign_out: Mutex::new(Reply::Ready(Ok(()))),
            exchange: Mutex::new(None),
            sign_in: Mutex::new(None),
            sign_up: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *lock(&provider.lookup) = Reply::Ready(Ok(Some(session)));
        provider
    }

    pub(crate) fn fail_lookup(&self, error: ProviderError) {
        *lock(&self.lookup) = Reply::Ready(Err(error));
    }

    pub(crate) fn defer_lookup(&self) -> Pending<Lookup> {
        let (sender, receiver) = oneshot::channel();
        *lock(&self.lookup) = Reply::Deferred(receiver);
        Pending { sender }
    }

    pub(crate) fn fail_sign_out(&self, error: ProviderError) {
        *lock(&self.sign_out) = Reply::Ready(Err(error));
    }

    pub(crate) fn succeed_sign_out(&self) {
        *lock(&self.sign_out) = Reply::Ready(Ok(()));
    }

    pub(crate) fn defer_sign_out(&self) -> Pending<SignOut> {
        let (sender, receiver) = oneshot::channel();
        *lock(&self.sign_out) = Reply::Deferred(receiver);
        Pending { sender }
    }

    pub(crate) fn set_exchange(&self, result: Lookup) {
        *lock(&self.exchange) = Some(result);
    }

    pub(crate) fn set_sign_in(&self, result: Result<Session, ProviderError>) {
        *lock(&self.sign_in) = Some(result);
    }

    pub(crate) fn set_sign_up(&self, result: Lookup) {
        *lock(&self.sign_up) = Some(result);
    }

    /// Emits to current listeners.
    pub(crate) fn emit(&self, event: SessionEvent) {
        self.broadcast.emit(&event);
    }

    /// Emits to every listener ever registered, released or not.
    pub(crate) fn emit_to_retained(&self, event: SessionEvent) {
        let callbacks: Vec<SessionCallback> = lock(&self.retained).clone();
        for callback in callbacks {
            callback(event.clone());
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.broadcast.listener_count()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: &str) {
        lock(&self.calls).push(call.to_string());
    }
}

#[async_trait(?Send)]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>> {
        self.record("get_session");
        let reply = Reply::take(&self.lookup, Ok(None));
        Ok(reply.wait().await??)
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        lock(&self.retained).push(callback.clone());
        self.broadcast.subscribe(callback)
    }

    async fn sign_in(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, Report<ProviderError>> {
        self.record(&format!("sign_in:{email}"));
        let result = lock(&self.sign_in)
            .clone()
            .unwrap_or_else(|| Ok(session_for(email)));
        let session = result?;
        self.broadcast.emit(&SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Session>, Report<ProviderError>> {
        self.record(&format!("sign_up:{email}:{metadata}"));
        let result = lock(&self.sign_up).clone().unwrap_or(Ok(None));
        Ok(result?)
    }

    async fn sign_out(&self) -> Result<(), Report<ProviderError>> {
        self.record("sign_out");
        let reply = Reply::take(&self.sign_out, Ok(()));
        Ok(reply.wait().await??)
    }

    async fn exchange_callback(
        &self,
        tokens: &CallbackTokens,
    ) -> Result<Option<Session>, Report<ProviderError>> {
        self.record("exchange_callback");
        let scripted = lock(&self.exchange).clone();
        match scripted {
            Some(result) => Ok(result?),
            None => {
                let _ = tokens;
                self.get_session().await
            }
        }
    }
}

/// Browser-like history stack.
#[derive(Default)]
pub(crate) struct MemoryHistory {
    inner: Mutex<HistoryState>,
}

#[derive(Default)]
struct HistoryState {
    entries: Vec<String>,
    index: usize,
    redirects: Vec<Redirect>,
}

impl MemoryHistory {
    pub(crate) fn at(path: &str) -> Self {
        Self {
            inner: Mutex::new(HistoryState {
                entries: vec![path.to_string()],
                index: 0,
                redirects: Vec::new(),
            }),
        }
    }

    pub(crate) fn visit(&self, path: &str) {
        self.navigate(Redirect::push(path));
        lock(&self.inner).redirects.pop();
    }

    pub(crate) fn current(&self) -> Option<String> {
        let state = lock(&self.inner);
        state.entries.get(state.index).cloned()
    }

    pub(crate) fn back(&self) -> Option<String> {
        let mut state = lock(&self.inner);
        state.index = state.index.saturating_sub(1);
        state.entries.get(state.index).cloned()
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        lock(&self.inner).entries.clone()
    }

    pub(crate) fn redirects(&self) -> Vec<Redirect> {
        lock(&self.inner).redirects.clone()
    }
}

impl Navigator for MemoryHistory {
    fn navigate(&self, redirect: Redirect) {
        let mut state = lock(&self.inner);
        let target = redirect.to().to_string();
        if state.entries.is_empty() {
            state.entries.push(target);
            state.index = 0;
        } else if redirect.replaces_history() {
            let index = state.index;
            state.entries[index] = target;
        } else {
            let keep = state.index + 1;
            state.entries.truncate(keep);
            state.entries.push(target);
            state.index = keep;
        }
        state.redirects.push(redirect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_history_replace_skips_entry_on_back() {
        let history = MemoryHistory::at("/");
        history.visit("/auth/callback");
        history.navigate(Redirect::replace("/"));

        assert_eq!(history.entries(), vec!["/", "/"]);
        assert_eq!(history.back().as_deref(), Some("/"));
    }

    #[test]
    fn memory_history_push_adds_entry() {
        let history = MemoryHistory::at("/");
        history.navigate(Redirect::push("/auth"));
        assert_eq!(history.current().as_deref(), Some("/auth"));
        assert_eq!(history.back().as_deref(), Some("/"));
        assert_eq!(history.redirects().len(), 1);
    }
}
