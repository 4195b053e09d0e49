//! Session snapshot types.
//!
//! A [`Session`] is an immutable copy of the store's state at one point in
//! time. The token and identity travel together: a snapshot either has both
//! or neither.

use secrecy::SecretString;

use super::user::UserProfile;

/// Coarse authentication status, suitable for choosing which view to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session.
    Anonymous,
    /// A stored token is being checked with the backend.
    Verifying,
    /// Token and identity are both present.
    Authenticated,
}

#[derive(Debug, Clone)]
struct Credentials {
    token: SecretString,
    identity: UserProfile,
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credentials: Option<Credentials>,
    verifying: bool,
}

impl Session {
    pub(crate) const fn anonymous() -> Self {
        Self {
            credentials: None,
            verifying: false,
        }
    }

    pub(crate) const fn verifying() -> Self {
        Self {
            credentials: None,
            verifying: true,
        }
    }

    pub(crate) fn authenticated(token: SecretString, identity: UserProfile) -> Self {
        Self {
            credentials: Some(Credentials { token, identity }),
            verifying: false,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match (&self.credentials, self.verifying) {
            (Some(_), _) => SessionStatus::Authenticated,
            (None, true) => SessionStatus::Verifying,
            (None, false) => SessionStatus::Anonymous,
        }
    }

    /// Whether a token and identity are present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// The bearer token, present only for an authenticated session.
    #[must_use]
    pub fn token(&self) -> Option<&SecretString> {
        self.credentials.as_ref().map(|c| &c.token)
    }

    /// The signed-in profile, present only for an authenticated session.
    #[must_use]
    pub fn identity(&self) -> Option<&UserProfile> {
        self.credentials.as_ref().map(|c| &c.identity)
    }

    /// Whether the signed-in user may open the back-office pages.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity().is_some_and(|identity| identity.is_admin)
    }
}

/// Keys used in the local key-value store.
pub mod keys {
    /// Key for the bearer token string.
    pub const TOKEN: &str = "nursery.token";

    /// Key for the JSON-serialized [`UserProfile`](super::UserProfile).
    pub const USER: &str = "nursery.user";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::sample_profile;

    #[test]
    fn test_status_matches_contents() {
        assert_eq!(Session::anonymous().status(), SessionStatus::Anonymous);
        assert_eq!(Session::verifying().status(), SessionStatus::Verifying);

        let session = Session::authenticated(SecretString::from("tok"), sample_profile());
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert!(session.token().is_some());
        assert!(session.identity().is_some());
    }

    #[test]
    fn test_verifying_exposes_neither_token_nor_identity() {
        let session = Session::verifying();
        assert!(session.token().is_none());
        assert!(session.identity().is_none());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::authenticated(SecretString::from("sekrit-token"), sample_profile());
        assert!(!format!("{session:?}").contains("sekrit-token"));
    }
}
