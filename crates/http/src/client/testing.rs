//! In-process fakes shared by the client unit tests

use super::error::{RenewalError, TransportError};
use super::provider::RenewalProvider;
use super::request::{PendingRequest, TransportResponse};
use super::transport::Transport;
use async_trait::async_trait;
use hostel_core::Credential;
use http::StatusCode;
use http::header::AUTHORIZATION;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub enum ProviderBehavior {
    Succeed {
        token: &'static str,
        delay: Duration,
    },
    Reject {
        delay: Duration,
    },
    /// Succeeds once `release` is called
    Gated {
        token: &'static str,
    },
    Hang,
    Panic,
}

pub struct FakeProvider {
    behavior: ProviderBehavior,
    calls: AtomicUsize,
    gate: Notify,
}

impl FakeProvider {
    pub fn new(behavior: ProviderBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl RenewalProvider for FakeProvider {
    async fn renew(&self) -> Result<Credential, RenewalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ProviderBehavior::Succeed { token, delay } => {
                tokio::time::sleep(*delay).await;
                Ok(Credential::new(*token))
            }
            ProviderBehavior::Reject { delay } => {
                tokio::time::sleep(*delay).await;
                Err(RenewalError::Rejected {
                    status: 401,
                    message: "session proof expired".into(),
                })
            }
            ProviderBehavior::Gated { token } => {
                self.gate.notified().await;
                Ok(Credential::new(*token))
            }
            ProviderBehavior::Hang => std::future::pending().await,
            ProviderBehavior::Panic => panic!("renewal provider blew up"),
        }
    }
}

/// One request as the transport saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub target: String,
    pub authorization: Option<String>,
    pub retried: bool,
}

/// Transport that answers 401 to any request carrying one of the `expired`
/// tokens and 200 otherwise, recording everything it sees
pub struct RecordingTransport {
    expired: Vec<String>,
    offline: bool,
    delays: HashMap<String, Duration>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn rejecting(expired: &[&str]) -> Self {
        Self {
            expired: expired.iter().map(|t| format!("Bearer {t}")).collect(),
            offline: false,
            delays: HashMap::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn offline() -> Self {
        Self {
            expired: Vec::new(),
            offline: true,
            delays: HashMap::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Hold responses for `target` back by `delay`
    pub fn with_delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: &PendingRequest) -> Result<TransportResponse, TransportError> {
        let authorization = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        self.sent.lock().unwrap().push(Sent {
            target: request.target.clone(),
            authorization: authorization.clone(),
            retried: request.is_retried(),
        });

        if self.offline {
            return Err(TransportError::new("connection refused"));
        }

        // Yield so concurrent requests interleave like real network calls
        tokio::task::yield_now().await;
        if let Some(delay) = self.delays.get(&request.target) {
            tokio::time::sleep(*delay).await;
        }

        match authorization {
            Some(auth) if self.expired.contains(&auth) => {
                Ok(TransportResponse::new(StatusCode::UNAUTHORIZED, "token expired"))
            }
            None => Ok(TransportResponse::new(StatusCode::UNAUTHORIZED, "missing token")),
            Some(_) => Ok(TransportResponse::new(StatusCode::OK, r#"{"ok":true}"#)),
        }
    }
}
