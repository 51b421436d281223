//! Integration tests for the API client.
//!
//! - `coalescing.rs`       - concurrent 401s share one refresh exchange
//! - `retry_once.rs`       - a call is recovered at most once
//! - `refresh_failure.rs`  - failed refresh ends the session for every caller
//! - `missing_refresh.rs`  - 401 without a refresh credential
//! - `propagation.rs`      - non-401 failures pass through unchanged
//! - `session.rs`          - login, registration, logout and probing
//! - `resources.rs`        - collection helpers
//! - `transport.rs`        - the reqwest transport against a local server

mod missing_refresh;
mod propagation;

use harness::*;
use crate::{ApiRequest, SessionState};
use serde_json::json;

/// Basic workflow: an expired credential is refreshed and the call succeeds.
#[tokio::test]
async fn basic_workflow() {
    let store = store_with(Some("stale"), Some("r1"));
    let backend = MockBackend::new(|request| async move {
        if is_refresh(&request) {
            return ok(json!({ "access": "fresh" }));
        }
        match bearer(&request) {
            Some("fresh") => ok(json!([{ "id": 1, "title": "Printer on fire" }])),
            _ => unauthorized(),
        }
    });
    let client = client_with(&backend, &store);
    assert_eq!(client.session_state(), SessionState::SignedIn);

    let response = client.request(ApiRequest::get("/api/tickets/")).await.unwrap();

    assert_eq!(response.json::<serde_json::Value>().unwrap()[0]["id"], 1);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(store.access_token().unwrap().as_deref(), Some("fresh"));
    assert_eq!(client.session_state(), SessionState::SignedIn);
    assert!(!client.is_refreshing());
}
