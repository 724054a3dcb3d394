//! Access credential model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Short-lived bearer token attached to authenticated requests
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential issued now
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_issued_at(token, Some(Utc::now()))
    }

    /// Create a credential with an explicit (or unknown) issue time
    pub fn with_issued_at(token: impl Into<String>, issued_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            issued_at,
        }
    }

    /// The opaque token value
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Tokens end up in logs through `?` formatting otherwise.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.token.chars().take(4).collect();
        f.debug_struct("Credential")
            .field("token", &format_args!("{visible}***"))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
