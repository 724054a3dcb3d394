//! Session lifecycle: login, logout and restoring a persisted credential

use super::{ClientError, HostelClient};
use crate::types::{LoginRequest, TokenResponse};
use hostel_core::Credential;
use http::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl HostelClient {
    /// Log in with username and password
    ///
    /// On success the returned credential is stored (and persisted) and the
    /// session cookie set by the server becomes the proof used for renewal.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Arc<Credential>, ClientError> {
        let request = self
            .request(Method::POST, &self.config().login_path)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })?;

        let response: TokenResponse = self.execute(request).await?;
        if response.token.is_empty() {
            return Err(ClientError::AuthenticationFailed(
                "login response carried no token".to_string(),
            ));
        }

        let credential = self.credentials().set(response.into_credential()).await;
        info!(username, "Logged in");
        Ok(credential)
    }

    /// Log out
    ///
    /// The server call is best-effort; the local credential is always cleared.
    pub async fn logout(&self) {
        let request = self.request(Method::POST, &self.config().logout_path);
        match self.send(request).await {
            Ok(response) if response.is_success() => debug!("Server session ended"),
            Ok(response) => warn!(status = %response.status, "Logout rejected by server"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }

        self.credentials().clear().await;
        info!("Logged out");
    }

    /// Load a previously persisted credential
    ///
    /// Returns whether a session was found.
    pub async fn restore_session(&self) -> Result<bool, ClientError> {
        let restored = self.credentials().restore().await?;
        if restored.is_some() {
            info!("Restored persisted session");
        }
        Ok(restored.is_some())
    }

    /// Whether an access credential is currently held
    pub fn is_authenticated(&self) -> bool {
        self.credentials().get().is_some()
    }
}
