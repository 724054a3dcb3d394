//! Hostel HTTP client
//!
//! An authenticated API client that transparently renews an expired access
//! credential. Requests that fail because the credential expired wait for a
//! single shared renewal and are then resent exactly once.

pub mod client;
pub mod types;

pub use client::{ClientConfig, ClientError, HostelClient, HostelClientBuilder, RenewalError};
pub use types::{LoginRequest, TokenResponse};
