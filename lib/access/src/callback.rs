//! Completion of out-of-band session handoffs.
//!
//! Email confirmation and similar flows land on the callback route with the
//! provider's tokens in the URL fragment. The resolver finishes the handoff
//! and always leaves the callback URL through a history replacement, so
//! back-navigation never returns to it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::navigation::{Navigator, Redirect, Route, sign_in_with_error};
use crate::provider::IdentityProvider;

/// Tokens carried in the callback URL fragment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallbackTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl CallbackTokens {
    /// Parses a URL fragment such as `#access_token=...&refresh_token=...`.
    ///
    /// The leading `#` is optional. Only the first occurrence of each
    /// parameter counts, and empty values count as absent. Values that are
    /// not valid percent-encoding are ignored.
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Self {
        let mut tokens = Self::default();
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

        for pair in fragment.split('&') {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let Some(value) = decode(raw) else {
                continue;
            };
            match key {
                "access_token" if tokens.access_token.is_none() => {
                    tokens.access_token = Some(value);
                }
                "refresh_token" if tokens.refresh_token.is_none() => {
                    tokens.refresh_token = Some(value);
                }
                "expires_in" if tokens.expires_in.is_none() => {
                    tokens.expires_in = value.parse().ok();
                }
                _ => {}
            }
        }
        tokens
    }

    /// Creates tokens directly.
    #[must_use]
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_in: None,
        }
    }

    /// Returns true if either token is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the access token lifetime in seconds, if given.
    #[must_use]
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }
}

fn decode(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).ok()?;
    (!decoded.is_empty()).then(|| decoded.into_owned())
}

impl fmt::Debug for CallbackTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// How a callback resolution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The fragment carried no tokens; the provider was not contacted.
    NoTokens,
    /// A session was established.
    SignedIn,
    /// The provider answered without a session.
    NoSession,
    /// The provider failed; the message is shown on the sign-in page.
    Failed(String),
    /// The resolver was cancelled before the provider answered.
    Cancelled,
}

/// Finalizes a session handoff and redirects.
///
/// One resolver per mounted callback view. Cancelling it (on unmount)
/// suppresses the redirect of a resolution still in flight.
pub struct CallbackResolver {
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    cancelled: Arc<AtomicBool>,
}

impl CallbackResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            provider,
            navigator,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Suppresses any navigation not yet performed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves the handoff described by `fragment` and navigates.
    ///
    /// Every redirect replaces the callback entry in history.
    pub async fn resolve(&self, fragment: &str) -> CallbackOutcome {
        let tokens = CallbackTokens::from_fragment(fragment);
        if !tokens.is_present() {
            tracing::debug!("callback without tokens, returning home");
            return self.finish(CallbackOutcome::NoTokens, Route::Home.path().to_string());
        }

        let result = self.provider.exchange_callback(&tokens).await;
        if self.is_cancelled() {
            tracing::debug!("callback resolver cancelled, skipping redirect");
            return CallbackOutcome::Cancelled;
        }

        match result {
            Ok(Some(_)) => {
                tracing::info!("callback established a session");
                self.finish(CallbackOutcome::SignedIn, Route::Home.path().to_string())
            }
            Ok(None) => {
                tracing::info!("callback resolved without a session");
                self.finish(CallbackOutcome::NoSession, Route::SignIn.path().to_string())
            }
            Err(report) => {
                let error = report.current_context();
                tracing::warn!(error = %error, "callback resolution failed");
                let message = error.user_message();
                let target = sign_in_with_error(&message);
                self.finish(CallbackOutcome::Failed(message), target)
            }
        }
    }

    fn finish(&self, outcome: CallbackOutcome, target: String) -> CallbackOutcome {
        if self.is_cancelled() {
            return CallbackOutcome::Cancelled;
        }
        self.navigator.navigate(Redirect::replace(target));
        outcome
    }
}

impl fmt::Debug for CallbackResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackResolver")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
