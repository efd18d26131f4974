//! Explicit sign-out.

use rootcause::prelude::Report;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::SignOutError;
use crate::navigation::{Navigator, Redirect, Route};
use crate::provider::IdentityProvider;
use crate::store::SessionStore;
use crate::sync::lock;

/// State of a sign-out control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutStatus {
    /// Ready.
    Idle,
    /// A request is in flight; further attempts are rejected.
    InFlight,
    /// The last attempt failed. Dismissible; retry is allowed.
    Failed(String),
}

/// Listener for status changes, e.g. to drive a busy indicator.
pub type StatusObserver = Arc<dyn Fn(&SignOutStatus) + Send + Sync>;

/// Drives one sign-out control.
///
/// On success the local session is cleared before navigating, without
/// waiting for the provider's signed-out event. On failure nothing changes
/// apart from the status.
pub struct SignOutController {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    status: Mutex<SignOutStatus>,
    observer: Option<StatusObserver>,
}

impl SignOutController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            provider,
            store,
            navigator,
            status: Mutex::new(SignOutStatus::Idle),
            observer: None,
        }
    }

    /// Registers a status observer.
    #[must_use]
    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SignOutStatus {
        lock(&self.status).clone()
    }

    /// Returns true while a request is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *lock(&self.status) == SignOutStatus::InFlight
    }

    /// Clears a failure message.
    pub fn dismiss_error(&self) {
        let dismissed = {
            let mut status = lock(&self.status);
            if matches!(*status, SignOutStatus::Failed(_)) {
                *status = SignOutStatus::Idle;
                true
            } else {
                false
            }
        };
        if dismissed {
            self.notify(&SignOutStatus::Idle);
        }
    }

    /// Signs out at the provider, clears the local session and navigates to
    /// the sign-in route.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInFlight` if a sign-out from this controller is still
    /// running, or `Provider` if the provider refused. The session is left
    /// untouched in both cases.
    pub async fn sign_out(&self) -> Result<(), Report<SignOutError>> {
        {
            let mut status = lock(&self.status);
            if *status == SignOutStatus::InFlight {
                tracing::debug!("sign-out already in flight");
                return Err(SignOutError::AlreadyInFlight.into());
            }
            *status = SignOutStatus::InFlight;
        }
        self.notify(&SignOutStatus::InFlight);

        match self.provider.sign_out().await {
            Ok(()) => {
                self.set_status(SignOutStatus::Idle);
                self.store.clear_local();
                self.navigator.navigate(Redirect::push(Route::SignIn.path()));
                tracing::info!("signed out");
                Ok(())
            }
            Err(report) => {
                let error = report.current_context();
                tracing::warn!(error = %error, "sign-out failed");
                let message = error.user_message();
                self.set_status(SignOutStatus::Failed(message.clone()));
                Err(SignOutError::Provider { message }.into())
            }
        }
    }

    fn set_status(&self, next: SignOutStatus) {
        *lock(&self.status) = next.clone();
        self.notify(&next);
    }

    fn notify(&self, status: &SignOutStatus) {
        if let Some(observer) = &self.observer {
            observer(status);
        }
    }
}

impl fmt::Debug for SignOutController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignOutController")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::guard::{AccessGuard, AccessState};
    use crate::policy::{AccessPolicy, AllowList};
    use crate::session::SessionEvent;
    use crate::testing::{FakeProvider, MemoryHistory, session_for};

    struct Harness {
        provider: Arc<FakeProvider>,
        history: Arc<MemoryHistory>,
        guard: AccessGuard,
        controller: SignOutController,
    }

    async fn signed_in_harness() -> Harness {
        let provider = Arc::new(FakeProvider::with_session(session_for(
            "mouloudy6565@gmail.com",
        )));
        let history = Arc::new(MemoryHistory::at("/"));
        let store = SessionStore::new();
        store.start(provider.clone()).await;
        let guard = AccessGuard::new(
            store.clone(),
            AccessPolicy::new(AllowList::new(["mouloudy6565@gmail.com"])),
        );
        let controller = SignOutController::new(provider.clone(), store, history.clone());
        Harness {
            provider,
            history,
            guard,
            controller,
        }
    }

    #[tokio::test]
    async fn success_clears_session_and_navigates_before_echo() {
        let h = signed_in_harness().await;
        assert!(h.guard.current().is_authorized());

        h.controller.sign_out().await.expect("sign-out succeeds");

        assert_eq!(h.guard.current(), AccessState::Unauthenticated);
        assert_eq!(h.history.redirects(), vec![Redirect::push("/auth")]);
        assert_eq!(h.controller.status(), SignOutStatus::Idle);

        h.provider.emit(SessionEvent::SignedOut);
        assert_eq!(h.guard.current(), AccessState::Unauthenticated);
    }

    #[tokio::test]
    async fn late_token_refresh_does_not_reauthorize() {
        let h = signed_in_harness().await;

        h.controller.sign_out().await.expect("sign-out succeeds");
        h.provider.emit(SessionEvent::TokenRefreshed(session_for(
            "mouloudy6565@gmail.com",
        )));

        assert_eq!(h.guard.current(), AccessState::Unauthenticated);
    }

    #[tokio::test]
    async fn failure_keeps_session_and_allows_retry() {
        let h = signed_in_harness().await;
        h.provider.fail_sign_out(ProviderError::Network {
            reason: "offline".to_string(),
        });

        let err = h.controller.sign_out().await.expect_err("sign-out fails");

        assert!(matches!(
            err.current_context(),
            SignOutError::Provider { .. }
        ));
        assert!(h.guard.current().is_authorized());
        assert!(h.history.redirects().is_empty());
        assert!(matches!(h.controller.status(), SignOutStatus::Failed(_)));

        h.controller.dismiss_error();
        assert_eq!(h.controller.status(), SignOutStatus::Idle);

        h.provider.succeed_sign_out();
        h.controller.sign_out().await.expect("retry succeeds");
        assert_eq!(h.guard.current(), AccessState::Unauthenticated);
    }

    #[tokio::test]
    async fn concurrent_sign_out_is_rejected() {
        let h = signed_in_harness().await;
        let pending = h.provider.defer_sign_out();

        let first = h.controller.sign_out();
        let second = async {
            tokio::task::yield_now().await;
            assert!(h.controller.is_busy());
            let result = h.controller.sign_out().await;
            pending.resolve(Ok(()));
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        let err = second.expect_err("second attempt rejected");
        assert_eq!(err.current_context(), &SignOutError::AlreadyInFlight);
        assert_eq!(h.history.redirects().len(), 1);
        assert_eq!(
            h.provider
                .calls()
                .iter()
                .filter(|call| *call == "sign_out")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn observer_sees_busy_then_idle() {
        let provider = Arc::new(FakeProvider::new());
        let history = Arc::new(MemoryHistory::at("/"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let controller = SignOutController::new(provider, SessionStore::new(), history)
            .with_observer(Arc::new(move |status: &SignOutStatus| {
                lock(&sink).push(status.clone());
            }));

        controller.sign_out().await.expect("sign-out succeeds");

        assert_eq!(
            *lock(&seen),
            vec![SignOutStatus::InFlight, SignOutStatus::Idle]
        );
    }
}
