//! REST client for the hosted GoTrue identity provider.
//!
//! Implements [`IdentityProvider`] against the provider's `/auth/v1` API:
//! password and refresh-token grants, signup, logout and user lookup. The
//! client owns token persistence and announces every change on its own
//! [`SessionBroadcast`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cybertest_lab_core::IdentityId;
use rootcause::prelude::Report;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::instrument;

use crate::callback::CallbackTokens;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::identity::Identity;
use crate::persistence::SessionPersistence;
use crate::provider::{IdentityProvider, SessionBroadcast, SessionCallback, Subscription};
use crate::session::{Session, SessionEvent};
use crate::sync::lock;

/// Sessions expiring within this margin are refreshed before being returned.
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Lifetime assumed for callback tokens that arrive without `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Provider statuses on logout that mean the session is already gone.
const GONE_ON_LOGOUT: [u16; 3] = [401, 403, 404];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserResponse {
    fn into_identity(self) -> Result<Identity, Report<ProviderError>> {
        let id = IdentityId::new(self.id).map_err(|e| ProviderError::InvalidResponse {
            reason: e.to_string(),
        })?;
        Ok(Identity::new(id, self.email.unwrap_or_default()))
    }
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<Session, Report<ProviderError>> {
        let expires_at = match self
            .expires_at
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        {
            Some(at) => at,
            None => expiry_after(now, self.expires_in)?,
        };
        Ok(Session::new(
            self.user.into_identity()?,
            self.access_token,
            self.refresh_token,
            expires_at,
        ))
    }
}

/// Returns the instant `lifetime` seconds after `now`.
///
/// The lifetime may come from a URL fragment, so negative and out-of-range
/// values are rejected rather than trusted.
fn expiry_after(
    now: DateTime<Utc>,
    lifetime: i64,
) -> Result<DateTime<Utc>, Report<ProviderError>> {
    if lifetime < 0 {
        return Err(ProviderError::InvalidResponse {
            reason: format!("negative token lifetime: {lifetime}"),
        }
        .into());
    }
    Duration::try_seconds(lifetime)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| {
            ProviderError::InvalidResponse {
                reason: format!("token lifetime out of range: {lifetime}"),
            }
            .into()
        })
}

/// Extracts a human-readable message from a provider error body.
///
/// The provider is inconsistent across endpoints: OAuth-style errors carry
/// `error_description`, the rest carry `msg` or `message`.
#[must_use]
pub fn provider_error_message(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        })
        .filter(|message| !message.is_empty())
        .map_or_else(
            || format!("Request failed with status {status}"),
            str::to_string,
        )
}

/// GoTrue-backed identity provider.
pub struct GoTrueClient {
    config: ProviderConfig,
    http: reqwest::Client,
    persistence: Arc<dyn SessionPersistence>,
    broadcast: SessionBroadcast,
    current: Mutex<Option<Session>>,
}

impl GoTrueClient {
    /// Creates a client and restores any persisted session.
    ///
    /// # Errors
    ///
    /// Returns `Misconfigured` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(
        config: ProviderConfig,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Result<Self, Report<ProviderError>> {
        config.validate().map_err(|e| ProviderError::Misconfigured {
            reason: e.to_string(),
        })?;

        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(std::time::Duration::from_secs(
            config.request_timeout_seconds(),
        ));
        let http = builder.build().map_err(|e| ProviderError::Misconfigured {
            reason: e.to_string(),
        })?;

        let restored = persistence.load().unwrap_or_else(|report| {
            tracing::warn!(
                error = %report.current_context(),
                "discarding unreadable persisted session"
            );
            None
        });
        tracing::debug!(
            restored = restored.is_some(),
            "identity provider client ready"
        );

        Ok(Self {
            config,
            http,
            persistence,
            broadcast: SessionBroadcast::new(),
            current: Mutex::new(restored),
        })
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Returns the cached session without contacting the provider.
    #[must_use]
    pub fn cached_session(&self) -> Option<Session> {
        lock(&self.current).clone()
    }

    /// Re-reads persisted tokens after another tab changed them and
    /// announces the difference.
    pub fn sync_from_storage(&self) {
        let stored = self.persistence.load().unwrap_or_else(|report| {
            tracing::warn!(
                error = %report.current_context(),
                "persisted session unreadable during sync"
            );
            None
        });

        {
            let mut current = lock(&self.current);
            if *current == stored {
                return;
            }
            current.clone_from(&stored);
        }

        let event = match stored {
            Some(session) => SessionEvent::SignedIn(session),
            None => SessionEvent::SignedOut,
        };
        tracing::debug!(event = event.name(), "session changed in another tab");
        self.broadcast.emit(&event);
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, Report<ProviderError>> {
        let endpoint = self.config.endpoint("/token?grant_type=refresh_token");
        let request = self
            .http
            .post(&endpoint)
            .json(&json!({ "refresh_token": refresh_token }));
        let response = self.send(request, &endpoint).await?;
        let token: TokenResponse = parse(response).await?;
        token.into_session(Utc::now())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, Report<ProviderError>> {
        let endpoint = self.config.endpoint("/user");
        let request = self.http.get(&endpoint).bearer_auth(access_token);
        let response = self.send(request, &endpoint).await?;
        let user: UserResponse = parse(response).await?;
        user.into_identity()
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<reqwest::Response, Report<ProviderError>> {
        let response = request
            .header("apikey", self.config.anon_key())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, endpoint = %endpoint, "identity provider unreachable");
                ProviderError::Network {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = provider_error_message(status.as_u16(), &body);
        tracing::debug!(
            endpoint = %endpoint,
            status = %status,
            message = %message,
            "identity provider returned error"
        );
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    fn save(&self, session: &Session) {
        *lock(&self.current) = Some(session.clone());
        if let Err(report) = self.persistence.store(session) {
            tracing::warn!(error = %report.current_context(), "could not persist session");
        }
    }

    /// Saves `fresh` only if `expected` is still the cached session.
    fn replace_current(&self, expected: &Session, fresh: &Session) -> bool {
        {
            let mut current = lock(&self.current);
            if current.as_ref() != Some(expected) {
                return false;
            }
            *current = Some(fresh.clone());
        }
        if let Err(report) = self.persistence.store(fresh) {
            tracing::warn!(error = %report.current_context(), "could not persist session");
        }
        true
    }

    fn forget(&self) {
        *lock(&self.current) = None;
        if let Err(report) = self.persistence.remove() {
            tracing::warn!(error = %report.current_context(), "could not remove persisted session");
        }
    }

    fn establish(&self, session: Session) -> Session {
        self.save(&session);
        self.broadcast.emit(&SessionEvent::SignedIn(session.clone()));
        session
    }

    fn end(&self) {
        self.forget();
        self.broadcast.emit(&SessionEvent::SignedOut);
    }
}

async fn parse<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, Report<ProviderError>> {
    Ok(response.json().await.map_err(|e| ProviderError::InvalidResponse {
        reason: e.to_string(),
    })?)
}

#[async_trait(?Send)]
impl IdentityProvider for GoTrueClient {
    #[instrument(skip_all)]
    async fn get_session(&self) -> Result<Option<Session>, Report<ProviderError>> {
        let Some(session) = self.cached_session() else {
            return Ok(None);
        };
        if !session.expires_within(Duration::seconds(REFRESH_MARGIN_SECONDS)) {
            return Ok(Some(session));
        }

        tracing::debug!("access token near expiry, refreshing");
        match self.refresh(session.refresh_token()).await {
            Ok(fresh) => {
                if !self.replace_current(&session, &fresh) {
                    tracing::debug!("session changed during refresh, discarding refreshed tokens");
                    return Ok(self.cached_session());
                }
                self.broadcast.emit(&SessionEvent::TokenRefreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(report) if matches!(report.current_context(), ProviderError::Rejected { .. }) => {
                tracing::info!(
                    error = %report.current_context(),
                    "refresh token rejected, session ended"
                );
                self.end();
                Ok(None)
            }
            Err(report) => Err(report),
        }
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.broadcast.subscribe(callback)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Report<ProviderError>> {
        let endpoint = self.config.endpoint("/token?grant_type=password");
        let request = self
            .http
            .post(&endpoint)
            .json(&json!({ "email": email, "password": password }));
        let response = self.send(request, &endpoint).await?;
        let token: TokenResponse = parse(response).await?;
        let session = token.into_session(Utc::now())?;
        tracing::info!(identity_id = %session.identity().id(), "signed in");
        Ok(self.establish(session))
    }

    #[instrument(skip(self, password, metadata))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Session>, Report<ProviderError>> {
        let endpoint = self.config.endpoint("/signup");
        let request = self.http.post(&endpoint).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let response = self.send(request, &endpoint).await?;
        let body: serde_json::Value = parse(response).await?;

        if body.get("access_token").is_none() {
            tracing::info!("account created, email confirmation required");
            return Ok(None);
        }
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::InvalidResponse {
                reason: e.to_string(),
            })?;
        let session = token.into_session(Utc::now())?;
        Ok(Some(self.establish(session)))
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> Result<(), Report<ProviderError>> {
        let Some(session) = self.cached_session() else {
            self.end();
            return Ok(());
        };

        let endpoint = self.config.endpoint("/logout");
        let request = self.http.post(&endpoint).bearer_auth(session.access_token());
        match self.send(request, &endpoint).await {
            Ok(_) => {}
            Err(report)
                if matches!(
                    report.current_context(),
                    ProviderError::Rejected { status, .. } if GONE_ON_LOGOUT.contains(status)
                ) =>
            {
                tracing::debug!("session already gone at provider");
            }
            Err(report) => return Err(report),
        }

        self.end();
        Ok(())
    }

    #[instrument(skip_all)]
    async fn exchange_callback(
        &self,
        tokens: &CallbackTokens,
    ) -> Result<Option<Session>, Report<ProviderError>> {
        let session = match (tokens.access_token(), tokens.refresh_token()) {
            (Some(access_token), Some(refresh_token)) => {
                let lifetime = tokens.expires_in().unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
                let expires_at = expiry_after(Utc::now(), lifetime)?;
                let identity = self.fetch_user(access_token).await?;
                Session::new(
                    identity,
                    access_token.to_string(),
                    refresh_token.to_string(),
                    expires_at,
                )
            }
            (None, Some(refresh_token)) => self.refresh(refresh_token).await?,
            (Some(_), None) => {
                return Err(ProviderError::InvalidResponse {
                    reason: "callback carried an access token without a refresh token"
                        .to_string(),
                }
                .into());
            }
            (None, None) => return self.get_session().await,
        };
        Ok(Some(self.establish(session)))
    }
}

impl fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("url", &self.config.url())
            .field("signed_in", &self.cached_session().is_some())
            .field("listeners", &self.broadcast.listener_count())
            .finish()
    }
}
