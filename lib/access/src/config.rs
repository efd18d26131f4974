//! Identity provider and allow-list configuration.
//!
//! Both halves are public by nature: the provider's anonymous key is meant
//! to be shipped to browsers, and the allow-list is enforced client-side.
//! The whole `AccessConfig` is therefore served to the hydrated client as is.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::{AccessPolicy, AllowList};

/// Connection settings for the hosted identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider project (e.g., "https://abc.supabase.co").
    url: String,
    /// Anonymous (public) API key, sent as the `apikey` header.
    anon_key: String,
    /// Key under which the provider client persists the session.
    /// Default: "cybertest-lab.auth-token"
    #[serde(default = "default_storage_key")]
    storage_key: String,
    /// Per-request timeout in seconds for native targets. Browsers rely on
    /// their own fetch timeout.
    /// Default: 30
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
}

fn default_storage_key() -> String {
    "cybertest-lab.auth-token".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl ProviderConfig {
    /// Creates a provider configuration with defaults for optional fields.
    #[must_use]
    pub fn new(url: String, anon_key: String) -> Self {
        Self {
            url,
            anon_key,
            storage_key: default_storage_key(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Overrides the persistence key.
    #[must_use]
    pub fn with_storage_key(mut self, storage_key: String) -> Self {
        self.storage_key = storage_key;
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    /// Returns the provider base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the anonymous API key.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Returns the persistence key.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Returns the request timeout in seconds.
    #[must_use]
    pub fn request_timeout_seconds(&self) -> u64 {
        self.request_timeout_seconds
    }

    /// Builds the URL of an auth API endpoint, e.g. `endpoint("/token")`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url.trim_end_matches('/'), path)
    }

    /// Checks that required values are present.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Missing {
                field: "access.provider.url",
            });
        }
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                field: "access.provider.url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.anon_key.is_empty() {
            return Err(ConfigError::Missing {
                field: "access.provider.anon_key",
            });
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::Missing {
                field: "access.provider.storage_key",
            });
        }
        Ok(())
    }
}

/// Everything the access-control subsystem needs at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Identity provider connection.
    provider: ProviderConfig,
    /// Emails allowed past the guard.
    /// Default: empty, which denies every identity.
    #[serde(default)]
    allowed_emails: AllowList,
}

impl AccessConfig {
    /// Creates an access configuration.
    #[must_use]
    pub fn new(provider: ProviderConfig, allowed_emails: AllowList) -> Self {
        Self {
            provider,
            allowed_emails,
        }
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Returns the allow-list.
    #[must_use]
    pub fn allowed_emails(&self) -> &AllowList {
        &self.allowed_emails
    }

    /// Builds the authorization policy for this deployment.
    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.allowed_emails.clone())
    }

    /// Validates both halves of the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.allowed_emails.validate()
    }
}
