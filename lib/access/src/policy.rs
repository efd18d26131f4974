//! Allow-list authorization.
//!
//! Authentication only proves who the user is. Whether that identity may use
//! the lab at all is decided here, against a fixed set of email addresses
//! injected at construction.
//!
//! Matching is exact and case-sensitive. No trimming, lowercasing or Unicode
//! normalization is applied, and callers must not apply their own: two
//! components that normalize differently would disagree about who is allowed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::identity::Identity;

/// The set of email addresses permitted to use the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Creates an allow-list from email addresses, kept verbatim.
    #[must_use]
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(emails.into_iter().map(Into::into).collect())
    }

    /// Returns true if `email` is byte-for-byte a member.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        self.0.contains(email)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nobody is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Checks that no entry is empty.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.contains("") {
            return Err(ConfigError::Invalid {
                field: "access.allowed_emails",
                reason: "entries must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Decides whether an identity may use the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allow_list: AllowList,
}

impl AccessPolicy {
    /// Creates a policy over the given allow-list.
    #[must_use]
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    /// Returns the allow-list the policy checks against.
    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Decides access for an optional identity.
    ///
    /// No identity is always denied. Deterministic and side-effect free.
    #[must_use]
    pub fn decide(&self, identity: Option<&Identity>) -> bool {
        identity.is_some_and(|identity| self.allows_email(identity.email()))
    }

    /// Checks a raw email, as typed into a sign-in form, with the same rule.
    #[must_use]
    pub fn allows_email(&self, email: &str) -> bool {
        self.allow_list.contains(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybertest_lab_core::IdentityId;
    use proptest::prelude::*;

    fn lab_policy() -> AccessPolicy {
        AccessPolicy::new(AllowList::new([
            "mouloudy6565@gmail.com",
            "mouloudy656565@gmail.com",
            "mouloudj.mohamed.04@gmail.com",
        ]))
    }

    fn identity(email: &str) -> Identity {
        Identity::new(IdentityId::new("user-1").expect("valid id"), email)
    }

    #[test]
    fn no_identity_is_denied() {
        assert!(!lab_policy().decide(None));
        assert!(!AccessPolicy::default().decide(None));
    }

    #[test]
    fn listed_email_is_allowed() {
        assert!(lab_policy().decide(Some(&identity("mouloudy6565@gmail.com"))));
    }

    #[test]
    fn unlisted_email_is_denied() {
        assert!(!lab_policy().decide(Some(&identity("random@example.com"))));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!lab_policy().decide(Some(&identity("Mouloudy6565@gmail.com"))));
        assert!(!lab_policy().decide(Some(&identity("MOULOUDY6565@GMAIL.COM"))));
    }

    #[test]
    fn matching_does_not_trim() {
        assert!(!lab_policy().decide(Some(&identity(" mouloudy6565@gmail.com"))));
        assert!(!lab_policy().decide(Some(&identity("mouloudy6565@gmail.com\n"))));
    }

    #[test]
    fn empty_email_is_denied() {
        assert!(!lab_policy().decide(Some(&identity(""))));
    }

    #[test]
    fn validate_rejects_empty_entry() {
        let list = AllowList::new(["a@example.com", ""]);
        assert!(list.validate().is_err());
        assert!(AllowList::new(["a@example.com"]).validate().is_ok());
    }

    #[test]
    fn allow_list_deserializes_from_array() {
        let list: AllowList =
            serde_json::from_str(r#"["b@example.com", "a@example.com"]"#).expect("deserialize");
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["a@example.com", "b@example.com"]);
    }

    proptest! {
        #[test]
        fn decide_matches_exact_membership(
            members in proptest::collection::vec(".{0,24}", 0..6),
            candidate in ".{0,24}",
        ) {
            let policy = AccessPolicy::new(AllowList::new(members.clone()));
            let expected = members.iter().any(|m| m.as_bytes() == candidate.as_bytes());
            prop_assert_eq!(policy.decide(Some(&identity(&candidate))), expected);
            prop_assert!(!policy.decide(None));
        }

        #[test]
        fn decide_is_deterministic(email in ".{0,24}") {
            let policy = lab_policy();
            let id = identity(&email);
            prop_assert_eq!(policy.decide(Some(&id)), policy.decide(Some(&id)));
        }
    }
}
