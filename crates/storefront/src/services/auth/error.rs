//! Session error types.

use thiserror::Error;

use crate::error::{ApiError, ErrorKind};

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a signed-in user and there is none.
    #[error("no active session")]
    NoActiveSession,

    /// The session was replaced or ended while the request was in flight;
    /// the response was discarded.
    #[error("session changed while the request was in flight")]
    Superseded,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] nursery_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// Message suitable for a banner or inline form hint.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveSession | Self::Superseded => {
                ErrorKind::Unauthorized.default_message().to_string()
            }
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::WeakPassword(msg) => msg.clone(),
            Self::Api(err) => err.message().to_string(),
        }
    }

    /// The classified backend error, if this came from a backend call.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}
