//! Sign-in and registration.
//!
//! The allow-list is checked before the provider is contacted, with the same
//! exact-match rule the guard uses. This is a courtesy to the user, not a
//! security boundary: the guard re-checks whatever session comes back.

use rootcause::prelude::Report;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ProviderError, SignInError};
use crate::navigation::{Navigator, Redirect, Route};
use crate::policy::AccessPolicy;
use crate::provider::IdentityProvider;

/// Which form the user submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignInMode {
    /// Existing account.
    #[default]
    SignIn,
    /// New account.
    Register,
}

impl SignInMode {
    /// Returns the other mode, for the form's toggle link.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::SignIn => Self::Register,
            Self::Register => Self::SignIn,
        }
    }
}

/// Form input. The password is redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
    username: Option<String>,
}

impl Credentials {
    /// Creates credentials from the form fields, verbatim.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            username: None,
        }
    }

    /// Sets the username chosen at registration. Empty means "not given".
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = (!username.is_empty()).then_some(username);
        self
    }

    /// Returns the email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the username to register: the one given, or the part of the
    /// email before the first `@`.
    #[must_use]
    pub fn username(&self) -> &str {
        match &self.username {
            Some(username) => username,
            None => self.email.split('@').next().unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// How a successful submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The provider issued a session.
    SignedIn,
    /// The account was created but must be confirmed by email first.
    ConfirmationRequired,
}

/// Backend of the sign-in form.
pub struct SignInController {
    provider: Arc<dyn IdentityProvider>,
    policy: AccessPolicy,
    navigator: Arc<dyn Navigator>,
    in_flight: AtomicBool,
}

impl SignInController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        policy: AccessPolicy,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            provider,
            policy,
            navigator,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Returns true while a submission is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submits the form and navigates to the default route on success.
    ///
    /// # Errors
    ///
    /// Returns `NotAllowed` without contacting the provider if the email is
    /// not on the allow-list, `AlreadyInFlight` for overlapping submissions,
    /// and `Provider` with the provider's message otherwise.
    pub async fn submit(
        &self,
        mode: SignInMode,
        credentials: &Credentials,
    ) -> Result<SignInOutcome, Report<SignInError>> {
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(SignInError::AlreadyInFlight)?;

        if !self.policy.allows_email(credentials.email()) {
            tracing::info!("sign-in refused for email outside the allow-list");
            return Err(SignInError::NotAllowed.into());
        }

        let outcome = match mode {
            SignInMode::SignIn => {
                self.provider
                    .sign_in(credentials.email(), &credentials.password)
                    .await
                    .map_err(provider_failure)?;
                SignInOutcome::SignedIn
            }
            SignInMode::Register => {
                let metadata = json!({ "username": credentials.username() });
                let session = self
                    .provider
                    .sign_up(credentials.email(), &credentials.password, metadata)
                    .await
                    .map_err(provider_failure)?;
                match session {
                    Some(_) => SignInOutcome::SignedIn,
                    None => SignInOutcome::ConfirmationRequired,
                }
            }
        };

        tracing::info!(mode = ?mode, outcome = ?outcome, "sign-in form accepted");
        self.navigator.navigate(Redirect::push(Route::Home.path()));
        Ok(outcome)
    }
}

fn provider_failure(report: Report<ProviderError>) -> SignInError {
    let error = report.current_context();
    tracing::warn!(error = %error, "sign-in request failed");
    SignInError::Provider {
        message: error.user_message(),
    }
}

impl fmt::Debug for SignInController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInController")
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
