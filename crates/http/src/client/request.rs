//! Outbound request and raw response model

use super::ClientError;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A request on its way through the dispatcher
///
/// `target` is a path relative to the client's base URL (an absolute URL is
/// accepted too). The `retried` flag is set before the single permitted
/// resend and is never cleared.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// Add a header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a raw body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ClientError> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Mark the request as already resent; it will never enter renewal again
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Status, headers and body of a completed exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode a 2xx body, or turn any other status into a [`ClientError`]
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        if self.is_success() {
            self.json()
        } else {
            let message = if self.body.is_empty() {
                self.status.to_string()
            } else {
                self.text()
            };
            Err(ClientError::from_status(self.status, message))
        }
    }
}
