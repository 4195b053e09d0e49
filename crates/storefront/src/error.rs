//! Failure classification for backend calls.
//!
//! Every failed call is described as a [`Failure`] and turned into an
//! [`ApiError`] by [`classify`]. The UI only ever sees `ApiError`, never a raw
//! transport error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was rejected because of its content (400, 409, 422).
    Validation,
    /// The token is missing, invalid or expired (401).
    Unauthorized,
    /// The token is valid but lacks permission (403).
    Forbidden,
    /// The resource does not exist (404).
    NotFound,
    /// The backend failed (5xx).
    ServerError,
    /// No response was received (connect failure, timeout, reset).
    NetworkError,
    /// Anything else, including undecodable responses.
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status code to a category.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 422 => Self::Validation,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Message shown when the backend does not supply one.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::Validation => "Please check the information you entered.",
            Self::Unauthorized => "Your session has expired. Please log in again.",
            Self::Forbidden => "You do not have permission to do that.",
            Self::NotFound => "We couldn't find what you were looking for.",
            Self::ServerError => "Something went wrong on our end. Please try again later.",
            Self::NetworkError => {
                "We couldn't reach the store. Check your connection and try again."
            }
            Self::Unknown => "An unexpected error occurred.",
        }
    }
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Form field the message belongs to.
    #[serde(alias = "param", alias = "path")]
    pub field: String,
    /// Human-readable message.
    #[serde(alias = "msg")]
    pub message: String,
}

/// JSON error body sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    /// Some backends send `error` instead of, or alongside, `message`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

impl ErrorBody {
    /// Parse a response body leniently; non-JSON bodies yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// First non-blank of `message` and `error`, trimmed.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
    }
}

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request exceeded its deadline.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The connection broke mid-request.
    Other,
}

/// The shape of a failed call, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The backend answered with a non-success status.
    Status {
        status: u16,
        body: Option<ErrorBody>,
    },
    /// No response was received.
    Transport {
        kind: TransportFailure,
        detail: String,
    },
    /// A response was received but could not be understood.
    Unknown(String),
}

/// A classified, user-presentable error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    field_errors: Vec<FieldError>,
    status: Option<u16>,
}

impl ApiError {
    /// Build an error of `kind` carrying its default message.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            field_errors: Vec::new(),
            status: None,
        }
    }

    /// Category of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message to show the user.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field-level validation messages, empty when the backend sent none.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Message for one form field, if the backend flagged it.
    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// HTTP status, when a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the backend rejected the presented credential.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

/// Classify a failed call. Pure and deterministic.
#[must_use]
pub fn classify(failure: &Failure) -> ApiError {
    match failure {
        Failure::Status { status, body } => {
            let kind = ErrorKind::from_status(*status);
            let body = body.clone().unwrap_or_default();
            let message = body
                .server_message()
                .unwrap_or_else(|| kind.default_message())
                .to_string();
            ApiError {
                kind,
                message,
                field_errors: body.errors,
                status: Some(*status),
            }
        }
        Failure::Transport { .. } => ApiError::new(ErrorKind::NetworkError),
        Failure::Unknown(_) => ApiError::new(ErrorKind::Unknown),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn status(code: u16) -> Failure {
        Failure::Status {
            status: code,
            body: None,
        }
    }

    #[test]
    fn test_status_table() {
        let cases = [
            (400, ErrorKind::Validation),
            (409, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (500, ErrorKind::ServerError),
            (503, ErrorKind::ServerError),
            (418, ErrorKind::Unknown),
            (429, ErrorKind::Unknown),
        ];

        for (code, kind) in cases {
            let err = classify(&status(code));
            assert_eq!(err.kind(), kind, "status {code}");
            assert_eq!(err.message(), kind.default_message());
            assert_eq!(err.status(), Some(code));
        }
    }

    #[test]
    fn test_transport_failures_are_network_errors() {
        for kind in [
            TransportFailure::Timeout,
            TransportFailure::Connect,
            TransportFailure::Other,
        ] {
            let err = classify(&Failure::Transport {
                kind,
                detail: "boom".to_string(),
            });
            assert_eq!(err.kind(), ErrorKind::NetworkError);
            assert_eq!(err.status(), None);
            // Raw transport detail never reaches the user.
            assert!(!err.message().contains("boom"));
        }
    }

    #[test]
    fn test_unknown_failure() {
        let err = classify(&Failure::Unknown("expected value at line 1".to_string()));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.message(), ErrorKind::Unknown.default_message());
    }

    #[test]
    fn test_server_message_overrides_default() {
        let body = ErrorBody::parse(r#"{"message": "Email already registered"}"#);
        let err = classify(&Failure::Status { status: 409, body });
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn test_blank_server_message_falls_back() {
        let body = ErrorBody::parse(r#"{"message": "   "}"#);
        let err = classify(&Failure::Status { status: 500, body });
        assert_eq!(err.message(), ErrorKind::ServerError.default_message());
    }

    #[test]
    fn test_field_errors_with_validator_aliases() {
        let raw = r#"{
            "message": "Validation failed",
            "errors": [
                {"param": "email", "msg": "Email is invalid"},
                {"field": "password", "message": "Too short"}
            ]
        }"#;
        let err = classify(&Failure::Status {
            status: 422,
            body: ErrorBody::parse(raw),
        });

        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(err.field_error("email"), Some("Email is invalid"));
        assert_eq!(err.field_error("password"), Some("Too short"));
        assert_eq!(err.field_error("phone"), None);
    }

    #[test]
    fn test_error_alias_and_non_json_body() {
        let body = ErrorBody::parse(r#"{"error": "Token expired"}"#).unwrap();
        assert_eq!(body.server_message(), Some("Token expired"));
        assert_eq!(ErrorBody::parse("<html>Bad Gateway</html>"), None);
    }

    #[test]
    fn test_message_preferred_over_error_key() {
        let raw = r#"{
            "message": "Email already registered",
            "error": "E11000 duplicate key",
            "errors": [{"field": "email", "message": "Already in use"}]
        }"#;
        let err = classify(&Failure::Status {
            status: 409,
            body: ErrorBody::parse(raw),
        });

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "Email already registered");
        assert_eq!(err.field_error("email"), Some("Already in use"));
    }

    #[test]
    fn test_blank_message_falls_back_to_error_key() {
        let body = ErrorBody::parse(r#"{"message": "", "error": "Token expired"}"#);
        let err = classify(&Failure::Status { status: 401, body });
        assert_eq!(err.message(), "Token expired");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let failure = Failure::Status {
            status: 401,
            body: ErrorBody::parse(r#"{"message": "jwt expired"}"#),
        };
        assert_eq!(classify(&failure), classify(&failure));
        assert!(classify(&failure).is_unauthorized());
    }
}
