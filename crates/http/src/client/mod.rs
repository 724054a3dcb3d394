//! Hostel HTTP client
//!
//! [`HostelClient`] attaches the current access credential to every request
//! and, when a request comes back 401/403 because the credential expired,
//! renews it once and resends. Concurrent expiries share a single renewal
//! call through the [`RenewalCoordinator`].

pub mod auth;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod invalidator;
pub mod provider;
pub mod request;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{Classification, RenewalClassifier};
pub use config::ClientConfig;
pub use coordinator::{DEFAULT_RENEWAL_TIMEOUT, RenewalCoordinator, RenewalOutcome};
pub use dispatcher::RequestDispatcher;
pub use error::{ClientError, RenewalError, TransportError};
pub use invalidator::SessionInvalidator;
pub use provider::{HttpRenewalProvider, RenewalProvider};
pub use request::{PendingRequest, TransportResponse};
pub use store::CredentialStore;
pub use transport::{ReqwestTransport, Transport};

use hostel_core::{DurableStorage, MemoryStorage, Navigator, NoopNavigator};
use http::Method;
use reqwest::ClientBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Hostel API client
#[derive(Clone)]
pub struct HostelClient {
    base_url: String,
    config: Arc<ClientConfig>,
    store: CredentialStore,
    coordinator: RenewalCoordinator,
    dispatcher: Arc<RequestDispatcher>,
}

impl HostelClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> HostelClientBuilder {
        HostelClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credential store backing this client
    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn coordinator(&self) -> &RenewalCoordinator {
        &self.coordinator
    }

    /// Effective bound on one renewal call
    pub fn renewal_timeout(&self) -> Duration {
        self.coordinator.timeout()
    }

    /// Create a request for `path`; the credential is attached when it is sent
    pub fn request(&self, method: Method, path: &str) -> PendingRequest {
        PendingRequest::new(method, path)
    }

    /// Send a request through the renewal-aware dispatcher
    pub async fn send(&self, request: PendingRequest) -> Result<TransportResponse, ClientError> {
        self.dispatcher.send(request).await
    }

    /// Execute a request and handle common errors
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ClientError> {
        self.send(request).await?.into_result()
    }

    /// GET `path` and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// POST `body` as JSON to `path` and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::POST, path).json(body)?)
            .await
    }
}

/// Builder for HostelClient
#[derive(Default)]
pub struct HostelClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    renewal_timeout: Option<Duration>,
    exempt_paths: Vec<String>,
    storage: Option<Arc<dyn DurableStorage>>,
    navigator: Option<Arc<dyn Navigator>>,
    transport: Option<Arc<dyn Transport>>,
    provider: Option<Arc<dyn RenewalProvider>>,
}

impl HostelClientBuilder {
    /// Start from a loaded configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bound on a single renewal call
    pub fn renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = Some(timeout);
        self
    }

    /// Exclude another target from renewal
    pub fn exempt(mut self, path: impl Into<String>) -> Self {
        self.exempt_paths.push(path.into());
        self
    }

    /// Where the credential is persisted (in-memory by default)
    pub fn storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Who is told to send the user back to login
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the HTTP renewal provider
    pub fn renewal_provider(mut self, provider: Arc<dyn RenewalProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HostelClient, ClientError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        config.exempt_paths.extend(self.exempt_paths);

        // The builder override is kept out of the config so sub-second values survive
        let renewal_timeout = self
            .renewal_timeout
            .unwrap_or_else(|| config.renewal_timeout());
        if renewal_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "renewal timeout must be greater than zero".to_string(),
            ));
        }

        url::Url::parse(&config.base_url).map_err(|e| {
            ClientError::Configuration(format!("invalid base_url {:?}: {e}", config.base_url))
        })?;

        // Ensure base_url ends without a trailing slash
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let base_url = config.base_url.clone();

        // One cookie jar for API calls and renewal: it carries the session proof
        let mut client_builder = ClientBuilder::new()
            .cookie_store(true)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            client_builder = client_builder.timeout(timeout);
        }
        let http = client_builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new(http.clone(), base_url.clone())));
        let provider = self.provider.unwrap_or_else(|| {
            Arc::new(HttpRenewalProvider::new(
                http,
                format!("{base_url}{}", config.renewal_path),
            ))
        });
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));

        let store = CredentialStore::new(storage);
        let invalidator = Arc::new(SessionInvalidator::new(store.clone(), navigator));
        let coordinator =
            RenewalCoordinator::new(provider, store.clone(), invalidator, renewal_timeout);
        let classifier = RenewalClassifier::new(config.exempt_endpoints());
        let dispatcher = Arc::new(RequestDispatcher::new(
            transport,
            store.clone(),
            classifier,
            coordinator.clone(),
        ));

        Ok(HostelClient {
            base_url,
            config: Arc::new(config),
            store,
            coordinator,
            dispatcher,
        })
    }
}
