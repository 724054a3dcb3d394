//! attach → send → classify → renew → resend once

use super::ClientError;
use super::classifier::{Classification, RenewalClassifier};
use super::error::RenewalError;
use super::coordinator::RenewalCoordinator;
use super::request::{PendingRequest, TransportResponse};
use super::store::CredentialStore;
use super::transport::Transport;
use hostel_core::Credential;
use http::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Sends requests with the current credential and recovers from expiry once
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    classifier: RenewalClassifier,
    coordinator: RenewalCoordinator,
}

impl RequestDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        classifier: RenewalClassifier,
        coordinator: RenewalCoordinator,
    ) -> Self {
        Self {
            transport,
            store,
            classifier,
            coordinator,
        }
    }

    /// Send `request`, renewing the credential and resending at most once
    ///
    /// The returned response may still be a 401/403 when the failure was not
    /// recoverable (exempt target, or the resend failed too). A failed renewal
    /// surfaces as [`ClientError::Renewal`] instead of the original status.
    ///
    /// If the credential was already replaced while this request was in
    /// flight, the request is resent with the replacement and no renewal is
    /// started; if it was cleared, the session is over.
    #[instrument(skip_all, fields(method = %request.method, target = %request.target))]
    pub async fn send(&self, mut request: PendingRequest) -> Result<TransportResponse, ClientError> {
        let sent_with = self.store.get();
        let response = self.attempt(&request, sent_with.as_deref()).await?;

        match self.classifier.classify(&response, &request) {
            Classification::Unrelated => return Ok(response),
            Classification::AuthRejected => {
                debug!(status = %response.status, retried = request.is_retried(), "Authorization rejected");
                return Ok(response);
            }
            Classification::AuthExpired => {
                debug!(status = %response.status, "Access credential expired; awaiting renewal");
            }
        }

        let current = self.store.get();
        let replaced = match (&current, &sent_with) {
            (Some(current), Some(sent)) => !Arc::ptr_eq(current, sent),
            (Some(_), None) => true,
            (None, _) => false,
        };
        let renewed = match (current, sent_with) {
            (Some(current), _) if replaced => {
                debug!("Credential replaced while in flight; skipping renewal");
                current
            }
            (None, Some(_)) => {
                debug!("Credential cleared while in flight");
                return Err(RenewalError::SessionEnded.into());
            }
            _ => self.coordinator.await_renewal().await?,
        };

        request.mark_retried();
        debug!("Resending with renewed credential");
        self.attempt(&request, Some(&*renewed)).await
    }

    async fn attempt(
        &self,
        request: &PendingRequest,
        credential: Option<&Credential>,
    ) -> Result<TransportResponse, ClientError> {
        let mut outgoing = request.clone();
        match credential {
            Some(credential) => {
                outgoing
                    .headers
                    .insert(AUTHORIZATION, HeaderValue::from_str(&credential.bearer())?);
            }
            None => {
                outgoing.headers.remove(AUTHORIZATION);
            }
        }

        Ok(self.transport.send(&outgoing).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::coordinator::DEFAULT_RENEWAL_TIMEOUT;
    use crate::client::invalidator::SessionInvalidator;
    use crate::client::testing::{FakeProvider, ProviderBehavior, RecordingTransport, Sent};
    use futures::future::join_all;
    use hostel_core::navigation::MockNavigator;
    use hostel_core::{MemoryStorage, Navigator, NoopNavigator};
    use http::{Method, StatusCode};
    use std::time::Duration;

    struct Harness {
        dispatcher: RequestDispatcher,
        transport: Arc<RecordingTransport>,
        provider: Arc<FakeProvider>,
        store: CredentialStore,
    }

    fn harness(
        transport: RecordingTransport,
        behavior: ProviderBehavior,
        navigator: Arc<dyn Navigator>,
    ) -> Harness {
        let transport = Arc::new(transport);
        let provider = Arc::new(FakeProvider::new(behavior));
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()));
        let invalidator = Arc::new(SessionInvalidator::new(store.clone(), navigator));
        let coordinator = RenewalCoordinator::new(
            provider.clone(),
            store.clone(),
            invalidator,
            DEFAULT_RENEWAL_TIMEOUT,
        );
        let classifier = RenewalClassifier::new(["/api/auth/login", "/api/auth/refresh"]);
        let dispatcher =
            RequestDispatcher::new(transport.clone(), store.clone(), classifier, coordinator);

        Harness {
            dispatcher,
            transport,
            provider,
            store,
        }
    }

    fn succeed(token: &'static str) -> ProviderBehavior {
        ProviderBehavior::Succeed {
            token,
            delay: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_credential_passes_through() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A0")).await;

        let response = h
            .dispatcher
            .send(PendingRequest::new(Method::GET, "/api/rooms"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.transport.sent().len(), 1);
        assert_eq!(
            h.transport.sent()[0].authorization.as_deref(),
            Some("Bearer A0")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_expiry_renews_once_and_resends_each_request_once() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let targets: Vec<String> = (0..5).map(|i| format!("/api/rooms/{i}")).collect();
        let responses = join_all(
            targets
                .iter()
                .map(|target| h.dispatcher.send(PendingRequest::new(Method::GET, target))),
        )
        .await;

        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.store.get().unwrap().token(), "A2");
        for response in responses {
            assert_eq!(response.unwrap().status, StatusCode::OK);
        }

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 10);
        for target in &targets {
            let attempts: Vec<&Sent> = sent.iter().filter(|s| &s.target == target).collect();
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].authorization.as_deref(), Some("Bearer A1"));
            assert!(!attempts[0].retried);
            assert_eq!(attempts[1].authorization.as_deref(), Some("Bearer A2"));
            assert!(attempts[1].retried);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_failure_surfaces_renewal_error() {
        let mut navigator = MockNavigator::new();
        navigator.expect_require_reauth().times(1).return_const(());
        let h = harness(
            RecordingTransport::rejecting(&["A1"]),
            ProviderBehavior::Reject {
                delay: Duration::from_millis(100),
            },
            Arc::new(navigator),
        );
        h.store.set(Credential::new("A1")).await;

        let results = join_all(
            (0..5).map(|i| {
                h.dispatcher
                    .send(PendingRequest::new(Method::GET, format!("/api/fees/{i}")))
            }),
        )
        .await;

        assert_eq!(h.provider.calls(), 1);
        assert!(h.store.get().is_none());
        for result in results {
            match result {
                Err(ClientError::Renewal(RenewalError::Rejected { status, .. })) => {
                    assert_eq!(status, 401);
                }
                other => panic!("expected renewal error, got {other:?}"),
            }
        }
        // Nothing was resent
        assert_eq!(h.transport.sent().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_that_fails_again_is_returned_without_second_renewal() {
        // The renewed token is rejected too
        let h = harness(
            RecordingTransport::rejecting(&["A1", "A2"]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let response = h
            .dispatcher
            .send(PendingRequest::new(Method::GET, "/api/bookings"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.transport.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_retried_request_never_renews() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let mut request = PendingRequest::new(Method::GET, "/api/bookings");
        request.mark_retried();
        let response = h.dispatcher.send(request).await.unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exempt_endpoint_failure_skips_renewal() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let response = h
            .dispatcher
            .send(PendingRequest::new(Method::POST, "/api/auth/login"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.store.get().unwrap().token(), "A1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates_immediately() {
        let h = harness(
            RecordingTransport::offline(),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let err = h
            .dispatcher
            .send(PendingRequest::new(Method::GET, "/api/rooms"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credential_is_renewed() {
        let h = harness(
            RecordingTransport::rejecting(&[]),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );

        let response = h
            .dispatcher
            .send(PendingRequest::new(Method::GET, "/api/rooms"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let sent = h.transport.sent();
        assert_eq!(sent[0].authorization, None);
        assert_eq!(sent[1].authorization.as_deref(), Some("Bearer A2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_expiry_reuses_credential_renewed_meanwhile() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"])
                .with_delay("/api/rooms/1", Duration::from_millis(50)),
            ProviderBehavior::Succeed {
                token: "A2",
                delay: Duration::from_millis(10),
            },
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let responses = join_all(
            ["/api/rooms/0", "/api/rooms/1"]
                .map(|target| h.dispatcher.send(PendingRequest::new(Method::GET, target))),
        )
        .await;

        assert_eq!(h.provider.calls(), 1);
        for response in responses {
            assert_eq!(response.unwrap().status, StatusCode::OK);
        }

        let late: Vec<Sent> = h
            .transport
            .sent()
            .into_iter()
            .filter(|s| s.target == "/api/rooms/1")
            .collect();
        assert_eq!(late.len(), 2);
        assert_eq!(late[1].authorization.as_deref(), Some("Bearer A2"));
        assert!(late[1].retried);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_logout_does_not_renew() {
        let h = harness(
            RecordingTransport::rejecting(&["A1"])
                .with_delay("/api/rooms", Duration::from_millis(50)),
            succeed("A2"),
            Arc::new(NoopNavigator),
        );
        h.store.set(Credential::new("A1")).await;

        let store = h.store.clone();
        let (result, ()) = tokio::join!(
            h.dispatcher.send(PendingRequest::new(Method::GET, "/api/rooms")),
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                store.clear().await;
            }
        );

        assert!(matches!(
            result,
            Err(ClientError::Renewal(RenewalError::SessionEnded))
        ));
        assert_eq!(h.provider.calls(), 0);
        assert!(h.store.get().is_none());
    }
}
