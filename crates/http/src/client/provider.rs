//! The one network call that exchanges the ambient session proof for a new credential

use super::error::RenewalError;
use crate::types::TokenResponse;
use async_trait::async_trait;
use hostel_core::Credential;
use http::StatusCode;

/// Source of fresh access credentials
///
/// Implementations make exactly one attempt per call; the coordinator decides
/// when to call and how long to wait.
#[async_trait]
pub trait RenewalProvider: Send + Sync {
    async fn renew(&self) -> Result<Credential, RenewalError>;
}

/// Renews by POSTing to the renewal endpoint
///
/// The session proof is whatever the shared client's cookie jar holds for the
/// API origin (set by the login response); it is never visible here.
#[derive(Clone)]
pub struct HttpRenewalProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRenewalProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RenewalProvider for HttpRenewalProvider {
    async fn renew(&self) -> Result<Credential, RenewalError> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RenewalError::Rejected {
                    status: status.as_u16(),
                    message,
                },
                _ => RenewalError::Failed {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RenewalError::Transport(e.to_string()))?;
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| RenewalError::InvalidResponse(e.to_string()))?;

        if token.token.is_empty() {
            return Err(RenewalError::InvalidResponse("empty access token".into()));
        }
        Ok(token.into_credential())
    }
}
