//! Identity provider runtime shared by every access-controlled view.
//!
//! The server owns the configuration and serves its public half through
//! [`get_access_config`]. Once hydrated, the browser fetches it, builds the
//! provider client and publishes the result in a context signal. Until then,
//! and during server rendering, the status is `Connecting` and gated views
//! show the loading surface.

use cybertest_lab_access::{
    AccessConfig, AccessPolicy, GoTrueClient, IdentityProvider, SessionPersistence,
};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::fmt;
use std::sync::Arc;

use crate::error::AccessSetupError;

/// Provider client and policy for this deployment.
#[derive(Clone)]
pub struct AccessRuntime {
    provider: Arc<dyn IdentityProvider>,
    policy: AccessPolicy,
}

impl AccessRuntime {
    /// Creates a runtime.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: AccessPolicy) -> Self {
        Self { provider, policy }
    }

    /// Returns the identity provider.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.provider)
    }

    /// Returns the authorization policy.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}

impl fmt::Debug for AccessRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessRuntime")
            .field("allowed_emails", &self.policy.allow_list().len())
            .finish_non_exhaustive()
    }
}

/// Where the runtime is in its start-up.
#[derive(Debug, Clone, Default)]
pub enum RuntimeStatus {
    /// Configuration not fetched yet. Always the case during SSR.
    #[default]
    Connecting,
    /// Provider client ready.
    Ready(AccessRuntime),
    /// No provider could be set up; carries a user-facing message.
    Unavailable(String),
}

impl RuntimeStatus {
    /// Returns the runtime once ready.
    #[must_use]
    pub fn runtime(&self) -> Option<&AccessRuntime> {
        match self {
            Self::Ready(runtime) => Some(runtime),
            Self::Connecting | Self::Unavailable(_) => None,
        }
    }
}

/// Server function serving the public access configuration.
///
/// The anonymous key and the allow-list are meant for the browser: the
/// provider expects the key client-side and the guard checks the list there.
#[server]
pub async fn get_access_config() -> Result<AccessConfig, ServerFnError> {
    use axum::Extension;

    let Extension(config): Extension<Arc<AccessConfig>> = leptos_axum::extract()
        .await
        .map_err(|e| {
            let err = AccessSetupError::ConfigMissing {
                details: e.to_string(),
            };
            tracing::error!(error = %err, "access configuration not available");
            err.into_server_error()
        })?;

    Ok(config.as_ref().clone())
}

/// Creates the runtime status signal, provides it as context and starts
/// connecting once running in the browser.
pub fn provide_access_runtime() -> RwSignal<RuntimeStatus> {
    let status = RwSignal::new(RuntimeStatus::Connecting);
    provide_context(status);

    // Effects only run after hydration, so the server never connects.
    Effect::new(move || {
        spawn_local(async move {
            let next = match get_access_config().await {
                Ok(config) => connect(config),
                Err(e) => Err(AccessSetupError::ConfigFetch {
                    details: e.to_string(),
                }),
            };
            let next = next.unwrap_or_else(|err| {
                tracing::warn!(error = %err, "access control unavailable");
                RuntimeStatus::Unavailable(err.user_message().to_string())
            });
            status.try_set(next);
        });
    });

    status
}

/// Returns the runtime status provided by the app root.
pub fn use_access_runtime() -> RwSignal<RuntimeStatus> {
    expect_context::<RwSignal<RuntimeStatus>>()
}

fn connect(config: AccessConfig) -> Result<RuntimeStatus, AccessSetupError> {
    let persistence = persistence_for(&config);
    let client = GoTrueClient::new(config.provider().clone(), persistence).map_err(|report| {
        AccessSetupError::ClientSetup {
            details: report.current_context().to_string(),
        }
    })?;
    let client = Arc::new(client);

    #[cfg(feature = "hydrate")]
    crate::client::watch_other_tabs(&client);

    tracing::info!(
        allowed_emails = config.allowed_emails().len(),
        "access control ready"
    );
    Ok(RuntimeStatus::Ready(AccessRuntime::new(
        client,
        config.policy(),
    )))
}

#[cfg(feature = "hydrate")]
fn persistence_for(config: &AccessConfig) -> Arc<dyn SessionPersistence> {
    Arc::new(crate::client::LocalStoragePersistence::new(
        config.provider().storage_key(),
    ))
}

#[cfg(not(feature = "hydrate"))]
fn persistence_for(_config: &AccessConfig) -> Arc<dyn SessionPersistence> {
    Arc::new(cybertest_lab_access::MemoryPersistence::new())
}
