//! Wire types for the authentication endpoints

use chrono::{DateTime, Utc};
use hostel_core::Credential;
use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body returned by both the login and the renewal endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token for authenticated requests
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    /// When the server issued the token, if it says
    #[serde(default, alias = "issuedAt", skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl TokenResponse {
    pub fn into_credential(self) -> Credential {
        match self.issued_at {
            Some(issued_at) => Credential::with_issued_at(self.token, Some(issued_at)),
            None => Credential::new(self.token),
        }
    }
}
