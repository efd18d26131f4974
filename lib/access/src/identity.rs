//! The authenticated identity carried by a session.

use cybertest_lab_core::IdentityId;
use serde::{Deserialize, Serialize};

/// Who the provider says the current user is.
///
/// Immutable for the lifetime of a session. The email is the only key the
/// authorization policy looks at; it is kept exactly as the provider sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    id: IdentityId,
    email: String,
}

impl Identity {
    /// Creates an identity from provider-issued values.
    ///
    /// Providers may omit the email for some sign-in methods; pass an empty
    /// string in that case. An empty email never matches the allow-list.
    #[must_use]
    pub fn new(id: IdentityId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }

    /// Returns the provider's stable identifier.
    #[must_use]
    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    /// Returns the email exactly as issued by the provider.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}
