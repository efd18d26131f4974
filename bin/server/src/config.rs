//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`AccessConfig`] for the identity provider and allow-list settings.
//! The allow-list is read from `ACCESS__ALLOWED_EMAILS` as a comma-separated
//! list. Entries are taken verbatim, so no spaces around the commas.

use cybertest_lab_access::{AccessConfig, ConfigError};
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Identity provider and allow-list configuration.
    pub access: AccessConfig,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("access.allowed_emails"),
            )
            .build()?
            .try_deserialize()
    }

    /// Checks values the environment cannot type-check.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.access.validate()
    }
}
