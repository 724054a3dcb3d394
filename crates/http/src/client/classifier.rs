//! Decides which failed responses may trigger credential renewal

use super::request::{PendingRequest, TransportResponse};
use http::StatusCode;
use std::collections::HashSet;

/// How an exchange relates to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not an auth failure; hand the response back as-is
    Unrelated,
    /// 401/403 on a first attempt against a non-exempt target
    AuthExpired,
    /// 401/403 that must not be recovered: exempt target or already retried
    AuthRejected,
}

/// Classifies responses against a fixed set of exempt endpoints
#[derive(Debug, Clone, Default)]
pub struct RenewalClassifier {
    exempt: HashSet<String>,
}

impl RenewalClassifier {
    pub fn new<I, S>(exempt: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exempt: exempt
                .into_iter()
                .map(|target| normalize(target.as_ref()))
                .collect(),
        }
    }

    pub fn is_exempt(&self, target: &str) -> bool {
        self.exempt.contains(&normalize(target))
    }

    pub fn is_auth_failure(status: StatusCode) -> bool {
        matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    pub fn classify(&self, response: &TransportResponse, request: &PendingRequest) -> Classification {
        if !Self::is_auth_failure(response.status) {
            Classification::Unrelated
        } else if request.is_retried() || self.is_exempt(&request.target) {
            Classification::AuthRejected
        } else {
            Classification::AuthExpired
        }
    }

    pub fn is_renewal_eligible(&self, response: &TransportResponse, request: &PendingRequest) -> bool {
        self.classify(response, request) == Classification::AuthExpired
    }
}

/// Reduce a target to its path: drop scheme/host, query, fragment and trailing slash
fn normalize(target: &str) -> String {
    let path = match url::Url::parse(target) {
        Ok(url) => url.path().to_string(),
        Err(_) => target
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
