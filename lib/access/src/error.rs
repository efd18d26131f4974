//! Error types for the access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ProviderError`: failures talking to the identity provider
//! - `SignOutError`: sign-out attempts that did not complete
//! - `SignInError`: sign-in or registration attempts that did not complete
//! - `ConfigError`: invalid access configuration
//!
//! Every variant carries a message that is safe to show to the user.
//! Tokens and passwords never appear in an error.

use std::fmt;

/// Errors from identity provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a response (offline, DNS, CORS, timeout).
    Network { reason: String },
    /// The provider answered with an error status.
    Rejected { status: u16, message: String },
    /// The provider answered with a body we could not understand.
    InvalidResponse { reason: String },
    /// Reading or writing persisted tokens failed.
    Storage { reason: String },
    /// The client is configured in a way the provider cannot accept.
    Misconfigured { reason: String },
}

impl ProviderError {
    /// Returns a message suitable for display in the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => {
                "Could not reach the authentication service. Please try again.".to_string()
            }
            Self::Rejected { message, .. } => message.clone(),
            Self::InvalidResponse { .. } => {
                "The authentication service returned an unexpected response.".to_string()
            }
            Self::Storage { .. } => "Could not access saved sign-in data.".to_string(),
            Self::Misconfigured { .. } => "Authentication is not configured.".to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { reason } => write!(f, "identity provider unreachable: {reason}"),
            Self::Rejected { status, message } => {
                write!(f, "identity provider rejected request ({status}): {message}")
            }
            Self::InvalidResponse { reason } => {
                write!(f, "invalid identity provider response: {reason}")
            }
            Self::Storage { reason } => write!(f, "session storage error: {reason}"),
            Self::Misconfigured { reason } => {
                write!(f, "identity provider misconfigured: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from a sign-out attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutError {
    /// A sign-out from the same control is already in flight.
    AlreadyInFlight,
    /// The provider refused or could not process the sign-out.
    Provider { message: String },
}

impl fmt::Display for SignOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInFlight => write!(f, "sign-out already in progress"),
            Self::Provider { message } => write!(f, "sign-out failed: {message}"),
        }
    }
}

impl std::error::Error for SignOutError {}

/// Errors from a sign-in or registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInError {
    /// The email is not on the allow-list; the provider was not contacted.
    NotAllowed,
    /// A submission from the same form is already in flight.
    AlreadyInFlight,
    /// The provider refused or could not process the request.
    Provider { message: String },
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed => write!(
                f,
                "This email address is not authorized to access this private testing environment."
            ),
            Self::AlreadyInFlight => write!(f, "a sign-in request is already in progress"),
            Self::Provider { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for SignInError {}

/// Errors from validating access configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty.
    Missing { field: &'static str },
    /// A value is present but unusable.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "missing configuration value: {field}"),
            Self::Invalid { field, reason } => {
                write!(f, "invalid configuration value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
