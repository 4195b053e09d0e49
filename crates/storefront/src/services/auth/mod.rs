//! Session store.
//!
//! [`SessionStore`] is the only way to change who is signed in. It owns the
//! [`SessionState`] cell and talks to the backend through the
//! [`RequestPipeline`]; the pipeline in turn only sees the state through the
//! `SessionHandle` capability.
//!
//! # Stale responses
//!
//! Every fetch captures the session generation before dispatch and applies
//! its result only if that generation is still current. A logout (or a 401
//! anywhere) therefore poisons any profile fetch that is still in flight.

mod error;
mod state;

pub use error::SessionError;
pub use state::SessionState;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use nursery_core::Email;

use super::endpoints;
use crate::error::{ApiError, ErrorKind};
use crate::models::{Address, ProfileUpdate, Session, SessionStatus, UserProfile};
use crate::pipeline::{RequestPipeline, SessionHandle};

/// Minimum password length accepted before calling the backend.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Email and password for `login`.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: Email,
    pub password: SecretString,
}

impl LoginCredentials {
    /// Build credentials from raw form input.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` if the email is malformed.
    pub fn new(email: &str, password: impl Into<String>) -> Result<Self, SessionError> {
        Ok(Self {
            email: Email::parse(email)?,
            password: SecretString::from(password.into()),
        })
    }
}

/// New-account form for `register`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// Password change form.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current_password: SecretString,
    pub new_password: SecretString,
}

/// Request body for login.
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for registration.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a Address>,
}

/// Request body for a password change.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Request body for a reset link.
#[derive(Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

/// Response from login and registration.
#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    user: UserProfile,
}

/// Response carrying a profile.
#[derive(Deserialize)]
struct ProfileResponse {
    user: UserProfile,
}

/// Response from token verification.
#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Response that only carries a message for the user.
#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Authoritative holder of the client's authentication state.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    state: Arc<SessionState>,
    pipeline: RequestPipeline,
}

impl SessionStore {
    /// Create a store over `state`, calling the backend through `pipeline`.
    ///
    /// `pipeline` should have been built with `state` as its session handle.
    #[must_use]
    pub fn new(state: Arc<SessionState>, pipeline: RequestPipeline) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner { state, pipeline }),
        }
    }

    /// Immutable snapshot of the current session.
    #[must_use]
    pub fn current_session(&self) -> Session {
        self.inner.state.snapshot()
    }

    /// Receiver notified after every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Restore a persisted session, verifying its token with the backend.
    ///
    /// While verification runs the session reports
    /// [`SessionStatus::Verifying`]. Any failure clears the stored session.
    /// Does nothing if a session is already present.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> SessionStatus {
        let state = &self.inner.state;
        let token = match state.storage().load_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("No stored session");
                return self.current_session().status();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored session");
                return self.current_session().status();
            }
        };

        let Some(generation) = state.begin_verification(token) else {
            tracing::debug!("Session already present, skipping bootstrap");
            return self.current_session().status();
        };

        match self.verify_stored_token().await {
            Ok(profile) => match state.apply_fetched_identity(generation, profile) {
                Ok(profile) => {
                    tracing::info!(email = %profile.email.masked(), "Restored stored session");
                }
                Err(e) => tracing::debug!(error = %e, "Bootstrap result discarded"),
            },
            Err(e) => {
                tracing::info!(kind = ?e.kind(), "Stored session rejected");
                state.abandon_verification(generation);
            }
        }

        self.current_session().status()
    }

    /// Run [`bootstrap`](Self::bootstrap) in the background so the first
    /// render does not wait on the network.
    #[must_use]
    pub fn spawn_bootstrap(&self) -> JoinHandle<SessionStatus> {
        let store = self.clone();
        tokio::spawn(async move { store.bootstrap().await })
    }

    async fn verify_stored_token(&self) -> Result<UserProfile, ApiError> {
        let verified: VerifyResponse = self.inner.pipeline.get(endpoints::VERIFY_TOKEN).await?;
        if verified.valid == Some(false) {
            return Err(ApiError::new(ErrorKind::Unauthorized));
        }
        if let Some(user) = verified.user {
            return Ok(user);
        }
        let profile: ProfileResponse = self.inner.pipeline.get(endpoints::PROFILE).await?;
        Ok(profile.user)
    }

    // =========================================================================
    // Sign in / sign out
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// On success the token and profile replace any existing session in one
    /// step. On failure the session is left as it was (a 401 still triggers
    /// the pipeline's unauthorized wipe).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` with the classified backend error.
    #[instrument(skip(self, credentials), fields(email = %credentials.email.masked()))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, SessionError> {
        let body = LoginRequest {
            email: credentials.email.as_str(),
            password: credentials.password.expose_secret(),
        };
        let auth: AuthResponse = self.inner.pipeline.post(endpoints::LOGIN, &body).await?;
        let profile = self.establish(auth)?;
        tracing::info!("Logged in");
        Ok(profile)
    }

    /// Create an account and sign in to it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WeakPassword` if the password is too short, or
    /// `SessionError::Api` with the classified backend error.
    #[instrument(skip(self, registration), fields(email = %registration.email.masked()))]
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, SessionError> {
        validate_password(registration.password.expose_secret())?;

        let body = RegisterRequest {
            first_name: registration.first_name.trim(),
            last_name: registration.last_name.trim(),
            email: registration.email.as_str(),
            password: registration.password.expose_secret(),
            phone: registration.phone.as_deref(),
            address: registration.address.as_ref(),
        };
        let auth: AuthResponse = self.inner.pipeline.post(endpoints::REGISTER, &body).await?;
        let profile = self.establish(auth)?;
        tracing::info!("Registered new account");
        Ok(profile)
    }

    fn establish(&self, auth: AuthResponse) -> Result<UserProfile, SessionError> {
        if auth.token.trim().is_empty() {
            tracing::warn!("Backend returned an empty token");
            return Err(ApiError::new(ErrorKind::Unknown).into());
        }
        self.inner
            .state
            .establish(SecretString::from(auth.token), auth.user.clone());
        Ok(auth.user)
    }

    /// Sign out.
    ///
    /// The backend is told best-effort; the local session and persisted
    /// state are cleared whatever the outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.inner.state.ticket().token.is_some() {
            let remote: Result<IgnoredAny, ApiError> =
                self.inner.pipeline.post_empty(endpoints::LOGOUT).await;
            if let Err(e) = remote {
                tracing::info!(kind = ?e.kind(), "Remote logout failed, clearing local session anyway");
            }
        }
        self.inner.state.clear("logout");
    }

    /// Wipe the session immediately without contacting the backend.
    pub fn invalidate(&self) {
        self.inner.state.clear("invalidated");
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Merge a partial update into the local identity.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` (and changes nothing) when no
    /// one is signed in.
    pub fn update_identity(&self, update: &ProfileUpdate) -> Result<UserProfile, SessionError> {
        self.inner.state.update_identity(update)
    }

    /// Save profile changes on the backend and adopt the returned profile.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` without calling the backend
    /// when no one is signed in, `SessionError::Superseded` if the session
    /// changed while the request was in flight, or `SessionError::Api`.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, SessionError> {
        let generation = self
            .inner
            .state
            .active_generation()
            .ok_or(SessionError::NoActiveSession)?;
        let response: ProfileResponse = self.inner.pipeline.put(endpoints::PROFILE, update).await?;
        self.inner
            .state
            .apply_fetched_identity(generation, response.user)
    }

    /// Re-fetch the profile from the backend.
    ///
    /// # Errors
    ///
    /// Same as [`update_profile`](Self::update_profile).
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<UserProfile, SessionError> {
        let generation = self
            .inner
            .state
            .active_generation()
            .ok_or(SessionError::NoActiveSession)?;
        let response: ProfileResponse = self.inner.pipeline.get(endpoints::PROFILE).await?;
        self.inner
            .state
            .apply_fetched_identity(generation, response.user)
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Change the signed-in user's password. The session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession`, `SessionError::WeakPassword`
    /// or `SessionError::Api`.
    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), SessionError> {
        if self.inner.state.active_generation().is_none() {
            return Err(SessionError::NoActiveSession);
        }
        validate_password(change.new_password.expose_secret())?;

        let body = ChangePasswordRequest {
            current_password: change.current_password.expose_secret(),
            new_password: change.new_password.expose_secret(),
        };
        let _: IgnoredAny = self
            .inner
            .pipeline
            .put(endpoints::CHANGE_PASSWORD, &body)
            .await?;
        tracing::info!("Password changed");
        Ok(())
    }

    /// Ask the backend to email a reset link. Works signed out.
    ///
    /// Returns the backend's confirmation message, if it sent one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` with the classified backend error.
    #[instrument(skip(self, email), fields(email = %email.masked()))]
    pub async fn forgot_password(&self, email: &Email) -> Result<Option<String>, SessionError> {
        let body = ForgotPasswordRequest {
            email: email.as_str(),
        };
        let response: Option<MessageResponse> = self
            .inner
            .pipeline
            .post(endpoints::FORGOT_PASSWORD, &body)
            .await?;
        Ok(response.and_then(|r| r.message))
    }
}

fn validate_password(password: &str) -> Result<(), SessionError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SessionError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use crate::storage::{MemoryStore, SessionStorage};

    fn offline_store() -> SessionStore {
        let state = Arc::new(SessionState::new(SessionStorage::new(Arc::new(
            MemoryStore::new(),
        ))));
        let config = StorefrontConfig::for_base_url(url::Url::parse("http://127.0.0.1:9/").unwrap());
        let pipeline = RequestPipeline::new(&config, state.clone()).unwrap();
        SessionStore::new(state, pipeline)
    }

    #[test]
    fn test_credentials_validate_email() {
        assert!(LoginCredentials::new("fern@nursery.example", "hunter22").is_ok());
        assert!(matches!(
            LoginCredentials::new("fern", "hunter22"),
            Err(SessionError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("abcdef").is_ok());
        assert!(matches!(
            validate_password("abc"),
            Err(SessionError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = LoginCredentials::new("fern@nursery.example", "hunter22").unwrap();
        assert!(!format!("{creds:?}").contains("hunter22"));
    }

    #[tokio::test]
    async fn test_bootstrap_without_stored_token_stays_anonymous() {
        let store = offline_store();
        assert_eq!(store.bootstrap().await, SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_signed_out_operations_fail_without_network() {
        let store = offline_store();

        let update = ProfileUpdate {
            first_name: Some("Ivy".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            store.update_identity(&update),
            Err(SessionError::NoActiveSession)
        ));
        assert!(matches!(
            store.update_profile(&update).await,
            Err(SessionError::NoActiveSession)
        ));
        assert!(matches!(
            store.refresh_profile().await,
            Err(SessionError::NoActiveSession)
        ));

        let change = PasswordChange {
            current_password: SecretString::from("oldpass1"),
            new_password: SecretString::from("newpass1"),
        };
        assert!(matches!(
            store.change_password(&change).await,
            Err(SessionError::NoActiveSession)
        ));
        assert_eq!(store.current_session().status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_when_signed_out_is_local_only() {
        let store = offline_store();
        store.logout().await;
        assert_eq!(store.current_session().status(), SessionStatus::Anonymous);
    }
}
