use super::harness::*;
use crate::{ApiError, ApiRequest, ExpiryReason, SessionState};

#[tokio::test]
async fn fails_without_refresh_attempt() {
    let store = store_with(Some("stale"), None);
    let backend = MockBackend::new(|_request| async move { unauthorized() });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::get("/api/tickets/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::AuthExpired(ExpiryReason::MissingRefreshCredential)
    ));
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.requests().len(), 1);
    assert!(!client.is_refreshing());
    assert_eq!(client.session_state(), SessionState::SignedOut);
}

#[tokio::test]
async fn anonymous_call_rejected_without_refresh_attempt() {
    let store = store_with(None, None);
    let backend = MockBackend::new(|request| async move {
        assert_eq!(bearer(&request), None);
        unauthorized()
    });
    let client = client_with(&backend, &store);
    assert_eq!(client.session_state(), SessionState::SignedOut);

    let err = client
        .request(ApiRequest::get("/api/tickets/"))
        .await
        .unwrap_err();

    assert!(err.is_auth_expired());
    assert_eq!(backend.refresh_calls(), 0);
}
