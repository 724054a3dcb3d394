//! Client error types

use hostel_core::CoreError;
use std::time::Duration;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or connectivity failure
    #[error("Request failed: {0}")]
    Transport(#[from] TransportError),

    /// The access credential could not be renewed
    #[error("Credential renewal failed: {0}")]
    Renewal(#[from] RenewalError),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential cannot be used as a header value
    #[error("Invalid credential header: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// Durable storage failure
    #[error("Session storage error: {0}")]
    Storage(#[from] CoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: http::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// A terminal 401/403 that the client did not (or could no longer) recover from
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::Forbidden(_))
    }

    /// Whether the session was reset and the user has to log in again
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Renewal(_))
    }
}

/// Connectivity failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Outcome of a failed renewal cycle
///
/// Cloned to every caller waiting on the same cycle, so it carries no
/// non-cloneable sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// The renewal endpoint refused the ambient session proof
    #[error("Renewal rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The renewal endpoint returned an unexpected status
    #[error("Renewal endpoint returned {status}: {message}")]
    Failed { status: u16, message: String },

    /// The renewal call did not finish in time
    #[error("Renewal timed out after {0:?}")]
    Timeout(Duration),

    /// The renewal call never reached the server
    #[error("Renewal request failed: {0}")]
    Transport(String),

    /// The renewal endpoint answered with a body that carries no credential
    #[error("Invalid renewal response: {0}")]
    InvalidResponse(String),

    /// The renewal task ended without producing an outcome
    #[error("Renewal was abandoned before completing")]
    Abandoned,

    /// The session was logged out while the renewal was in flight
    #[error("Session ended while renewal was in flight")]
    SessionEnded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_from_status_maps_auth_codes() {
        let err = ClientError::from_status(StatusCode::UNAUTHORIZED, "nope".into());
        assert!(matches!(err, ClientError::AuthenticationFailed(_)));
        assert!(err.is_auth_rejected());

        let err = ClientError::from_status(StatusCode::FORBIDDEN, "nope".into());
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert!(err.is_auth_rejected());

        let err = ClientError::from_status(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(matches!(err, ClientError::ServerError { status: 502, .. }));
        assert!(!err.is_auth_rejected());
    }

    #[test]
    fn test_renewal_error_requires_reauth() {
        let err = ClientError::from(RenewalError::Timeout(Duration::from_secs(10)));
        assert!(err.requires_reauth());
        assert!(!err.is_auth_rejected());
        assert_eq!(
            err.to_string(),
            "Credential renewal failed: Renewal timed out after 10s"
        );
    }
}
