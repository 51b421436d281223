use super::harness::*;
use crate::{ApiError, ApiRequest, SessionState};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn not_found_passes_through() {
    let store = store_with(Some("good"), Some("r1"));
    let backend = MockBackend::new(|_request| async move {
        json_response(StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::get("/api/tickets/999/"))
        .await
        .unwrap_err();

    match err {
        ApiError::Http { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, r#"{"detail":"Not found."}"#);
        }
        other => panic!("expected HTTP 404, got {:?}", other),
    }
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn forbidden_is_not_an_expiry() {
    let store = store_with(Some("good"), Some("r1"));
    let backend = MockBackend::new(|_request| async move {
        json_response(
            StatusCode::FORBIDDEN,
            json!({ "detail": "You do not have permission to perform this action." }),
        )
    });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::delete("/api/users/2/"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    assert!(!err.is_auth_expired());
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(store.access_token().unwrap().as_deref(), Some("good"));
    assert_eq!(client.session_state(), SessionState::SignedIn);
}

#[tokio::test]
async fn server_error_is_transient() {
    let store = store_with(Some("good"), Some("r1"));
    let backend = MockBackend::new(|_request| async move {
        Ok(crate::ApiResponse::new(
            StatusCode::BAD_GATEWAY,
            "<html>Bad Gateway</html>",
        ))
    });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::get("/api/tickets/analytics/"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn network_failure_is_not_retried() {
    let store = store_with(Some("good"), Some("r1"));
    let backend = MockBackend::new(|_request| async move {
        Err(ApiError::Network("operation timed out".to_string()))
    });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::get("/api/tickets/"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(store.refresh_token().unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn replay_failure_other_than_401_passes_through() {
    let store = store_with(Some("stale"), Some("r1"));
    let backend = MockBackend::new(|request| async move {
        if is_refresh(&request) {
            return ok(json!({ "access": "fresh" }));
        }
        match bearer(&request) {
            Some("fresh") => json_response(
                StatusCode::BAD_REQUEST,
                json!({ "title": ["This field is required."] }),
            ),
            _ => unauthorized(),
        }
    });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::post("/api/tickets/").with_body(json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn typed_helpers_decode_json() {
    let store = store_with(Some("good"), Some("r1"));
    let backend = MockBackend::new(|request| async move {
        if request.method == reqwest::Method::DELETE {
            json_response(StatusCode::NO_CONTENT, json!(null))
        } else {
            ok(json!({ "id": 3, "status": 2 }))
        }
    });
    let client = client_with(&backend, &store);

    #[derive(serde::Deserialize)]
    struct Ticket {
        id: i64,
        status: u8,
    }

    let ticket: Ticket = client
        .patch_json("/api/tickets/3/", &json!({ "status": 2 }))
        .await
        .unwrap();
    assert_eq!((ticket.id, ticket.status), (3, 2));

    client.delete("/api/tickets/3/").await.unwrap();
    assert_eq!(backend.requests()[1].method, reqwest::Method::DELETE);
}

struct UnreadableStorage;

impl helpdesk_storage::CredentialStorage for UnreadableStorage {
    fn set(&self, _key: &str, _value: &str) -> helpdesk_storage::StorageResult<()> {
        Ok(())
    }

    fn get(&self, _key: &str) -> helpdesk_storage::StorageResult<Option<String>> {
        Err(helpdesk_storage::StorageError::Encoding(
            "credentials file is not JSON".to_string(),
        ))
    }

    fn delete(&self, _key: &str) -> helpdesk_storage::StorageResult<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn unreadable_credentials_fail_before_sending() {
    let store = std::sync::Arc::new(helpdesk_storage::CredentialStore::new(Box::new(
        UnreadableStorage,
    )));
    let backend = MockBackend::new(|_request| async move { ok(json!([])) });
    let client = client_with(&backend, &store);

    let err = client
        .request(ApiRequest::get("/api/tickets/"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Storage(_)));
    assert!(backend.requests().is_empty());
    assert_eq!(client.session_state(), SessionState::SignedOut);
}
