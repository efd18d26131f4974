//! Where the provider client keeps its tokens between page loads.

use rootcause::prelude::Report;
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::session::Session;
use crate::sync::lock;

/// Key-value slot holding one serialized session.
///
/// Synchronous, like the browser's `localStorage`.
pub trait SessionPersistence: Send + Sync {
    /// Reads the persisted session.
    fn load(&self) -> Result<Option<Session>, Report<ProviderError>>;

    /// Persists `session`, replacing any previous one.
    fn store(&self, session: &Session) -> Result<(), Report<ProviderError>>;

    /// Forgets the persisted session.
    fn remove(&self) -> Result<(), Report<ProviderError>>;
}

/// Serializes a session for storage.
///
/// # Errors
///
/// Returns `Storage` if the session cannot be serialized.
pub fn encode_session(session: &Session) -> Result<String, Report<ProviderError>> {
    Ok(serde_json::to_string(session).map_err(|e| ProviderError::Storage {
        reason: e.to_string(),
    })?)
}

/// Parses a stored session.
///
/// # Errors
///
/// Returns `Storage` if the value is not a serialized session.
pub fn decode_session(raw: &str) -> Result<Session, Report<ProviderError>> {
    Ok(serde_json::from_str(raw).map_err(|e| ProviderError::Storage {
        reason: e.to_string(),
    })?)
}

/// Process-local persistence, used on the server and in tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    value: Mutex<Option<String>>,
}

impl MemoryPersistence {
    /// Creates empty persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the raw stored value, as another tab writing the same key
    /// would.
    pub fn set_raw(&self, value: Option<String>) {
        *lock(&self.value) = value;
    }

    /// Returns the raw stored value.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        lock(&self.value).clone()
    }
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Session>, Report<ProviderError>> {
        match lock(&self.value).as_deref() {
            Some(raw) => decode_session(raw).map(Some),
            None => Ok(None),
        }
    }

    fn store(&self, session: &Session) -> Result<(), Report<ProviderError>> {
        let raw = encode_session(session)?;
        *lock(&self.value) = Some(raw);
        Ok(())
    }

    fn remove(&self) -> Result<(), Report<ProviderError>> {
        *lock(&self.value) = None;
        Ok(())
    }
}
