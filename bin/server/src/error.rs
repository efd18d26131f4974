//! Domain error types for wiring access control into the app.
//!
//! This module provides typed error variants for setting up the access
//! runtime, following the rootcause pattern used by the access crate.

use leptos::server_fn::error::ServerFnError;
use std::fmt;

/// Errors that leave the app without an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSetupError {
    /// The server did not attach access configuration to the request.
    ConfigMissing { details: String },
    /// The configuration could not be fetched by the browser.
    ConfigFetch { details: String },
    /// The provider client rejected the served configuration.
    ClientSetup { details: String },
}

impl fmt::Display for AccessSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMissing { details } => {
                write!(f, "access configuration missing from request: {}", details)
            }
            Self::ConfigFetch { details } => {
                write!(f, "failed to fetch access configuration: {}", details)
            }
            Self::ClientSetup { details } => {
                write!(f, "failed to set up identity provider client: {}", details)
            }
        }
    }
}

impl std::error::Error for AccessSetupError {}

impl AccessSetupError {
    /// Returns a message suitable for display in the UI.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } | Self::ClientSetup { .. } => {
                "Authentication is not configured."
            }
            Self::ConfigFetch { .. } => "Could not reach the server. Please reload the page.",
        }
    }

    /// Convert to a user-safe ServerFnError.
    pub fn into_server_error(self) -> ServerFnError {
        ServerFnError::new(self.user_message())
    }
}
