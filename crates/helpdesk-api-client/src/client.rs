//! Authenticated API client with coalesced credential refresh.
//!
//! Every protected call carries the stored access credential. When the
//! backend answers 401 the client exchanges the refresh credential once,
//! replays the call with the new access credential, and shares that single
//! exchange with every call that failed while it was in flight.

use crate::refresh::{GateEntry, RefreshGate, RefreshLease, RefreshOutcome};
use crate::session_fsm::{SessionMachineInput, SessionState, SessionStateCallback, SessionTracker};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, OutgoingRequest, ReqwestTransport};
use crate::{ApiError, ApiResult, ExpiryReason};
use helpdesk_config_and_utils::Config;
use helpdesk_storage::CredentialStore;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Token refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/api/auth/refresh/";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh credentials.
    #[serde(default)]
    refresh: Option<String>,
}

/// One logical call on its way through the client.
///
/// `retried` is set before the refresh starts, so a replay that fails with
/// 401 again is returned to the caller instead of recovering twice.
#[derive(Debug, Clone)]
struct PendingCall {
    id: Uuid,
    request: ApiRequest,
    retried: bool,
    sent_with: Option<String>,
}

impl PendingCall {
    fn new(request: ApiRequest, sent_with: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            retried: false,
            sent_with,
        }
    }
}

struct ClientInner {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    gate: RefreshGate,
    session: SessionTracker,
}

/// Authenticated client for the helpdesk backend.
///
/// Cheap to clone; clones share the credential store, the refresh gate and
/// the session state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("state", &self.inner.session.state())
            .field("refreshing", &self.inner.gate.is_refreshing())
            .finish()
    }
}

impl ApiClient {
    /// Create a client over an arbitrary transport.
    ///
    /// A session already present in `credentials` is restored.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: Url,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let session = SessionTracker::new();

        let restored = match (credentials.access_token(), credentials.refresh_token()) {
            (Ok(access), Ok(refresh)) => access.is_some() || refresh.is_some(),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read stored credentials, starting signed out");
                false
            }
        };
        if restored {
            session.transition(SessionMachineInput::SessionRestored);
        }

        Self {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                credentials,
                gate: RefreshGate::new(),
                session,
            }),
        }
    }

    /// Create a client with the production `reqwest` transport.
    pub fn from_config(config: &Config, credentials: Arc<CredentialStore>) -> ApiResult<Self> {
        let base_url = config.api_base_url()?;
        let transport = ReqwestTransport::new(config.request_timeout())?;
        info!(base_url = %base_url, "API client configured");
        Ok(Self::new(Arc::new(transport), base_url, credentials))
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_session_callback(&self, callback: SessionStateCallback) {
        self.inner.session.set_callback(callback);
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.gate.is_refreshing()
    }

    pub(crate) fn record(&self, input: SessionMachineInput) -> SessionState {
        self.inner.session.transition(input)
    }

    /// Issue a protected request.
    ///
    /// Resolves with any 2xx response. A 401 is recovered at most once
    /// through the refresh protocol; an unrecoverable 401 is
    /// [`ApiError::AuthExpired`] and leaves no credentials stored. Every
    /// other failure is returned unchanged.
    pub async fn request(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let mut call = PendingCall::new(request, None);
        match self.inner.credentials.access_token() {
            Ok(access) => call.sent_with = access,
            Err(e) => return Err(self.observe(&call, e.into())),
        }
        self.execute(call).await
    }

    /// Issue a request without a credential and without 401 recovery.
    /// Used for the sign-in endpoints.
    pub(crate) async fn send_unauthenticated(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let mut call = PendingCall::new(request, None);
        call.retried = true;
        self.execute(call).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::post(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(ApiRequest::patch(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.request(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Send a call, recovering from the first 401. Runs at most twice.
    async fn execute(&self, mut call: PendingCall) -> ApiResult<ApiResponse> {
        loop {
            let response = match self.dispatch(&call).await {
                Ok(response) => response,
                Err(e) => return Err(self.observe(&call, e)),
            };

            if response.is_success() {
                return Ok(response);
            }

            if response.status == StatusCode::UNAUTHORIZED && !call.retried {
                call.retried = true;
                match self.recover(&call).await {
                    Ok(access) => {
                        debug!(request_id = %call.id, "Replaying request with refreshed credential");
                        call.sent_with = Some(access);
                        continue;
                    }
                    Err(e) => return Err(self.observe(&call, e)),
                }
            }

            let ApiResponse { status, body } = response;
            return Err(self.observe(&call, ApiError::Http { status, body }));
        }
    }

    async fn dispatch(&self, call: &PendingCall) -> ApiResult<ApiResponse> {
        let url = call.request.url(&self.inner.base_url)?;
        debug!(
            request_id = %call.id,
            method = %call.request.method,
            path = %call.request.path,
            authenticated = call.sent_with.is_some(),
            retried = call.retried,
            "Sending API request"
        );

        self.inner
            .transport
            .send(OutgoingRequest {
                method: call.request.method.clone(),
                url,
                bearer: call.sent_with.clone(),
                body: call.request.body.clone(),
            })
            .await
    }

    /// Obtain a fresh access credential for a call that got 401.
    async fn recover(&self, call: &PendingCall) -> ApiResult<String> {
        let inner = &self.inner;

        let Some(refresh) = inner.credentials.refresh_token()? else {
            warn!(request_id = %call.id, "Access rejected and no refresh credential stored");
            inner.session.transition(SessionMachineInput::SessionEnded);
            return Err(ApiError::AuthExpired(ExpiryReason::MissingRefreshCredential));
        };

        let lease = match inner.gate.enter() {
            GateEntry::Wait(rx) => {
                debug!(request_id = %call.id, "Waiting on in-flight refresh");
                return match rx.await {
                    Ok(Ok(access)) => Ok(access),
                    Ok(Err(reason)) => Err(ApiError::AuthExpired(reason)),
                    Err(_) => Err(ApiError::AuthExpired(ExpiryReason::RefreshInterrupted)),
                };
            }
            GateEntry::Lead(lease) => lease,
        };

        // A refresh that settled between this call's send and its 401 has
        // already replaced the credential; reuse it instead of refreshing again.
        let stored = inner.credentials.access_token()?;
        if let Some(access) = stored.filter(|access| Some(access) != call.sent_with.as_ref()) {
            debug!(request_id = %call.id, "Access credential already refreshed");
            lease.settle(Ok(access.clone()));
            return Ok(access);
        }

        inner.session.transition(SessionMachineInput::AccessRejected);
        info!(request_id = %call.id, "Access credential rejected, refreshing");

        // The exchange runs on its own task so that a caller going away
        // cannot strand the queued callers.
        let client = self.clone();
        let handle = tokio::spawn(async move { client.run_refresh(lease, refresh).await });

        match handle.await {
            Ok(outcome) => outcome.map_err(ApiError::AuthExpired),
            Err(e) => {
                error!(request_id = %call.id, error = %e, "Refresh task failed");
                Err(ApiError::AuthExpired(ExpiryReason::RefreshInterrupted))
            }
        }
    }

    /// Perform the exchange, update storage, then settle the lease.
    async fn run_refresh(self, lease: RefreshLease, refresh: String) -> RefreshOutcome {
        let outcome = match self.exchange_refresh(&refresh).await {
            Ok(tokens) => self.store_refreshed(&refresh, tokens),
            Err(reason) => Err(reason),
        };

        match &outcome {
            Ok(_) => {
                self.inner.session.transition(SessionMachineInput::RefreshSucceeded);
                info!("Access credential refreshed");
            }
            Err(reason) => match self.inner.credentials.refresh_token() {
                // A new login replaced the session during the exchange.
                Ok(Some(current)) if current != refresh => {
                    info!(reason = %reason, "Refresh failed after a new sign-in, keeping stored credentials");
                    self.inner.session.transition(SessionMachineInput::SessionRestored);
                }
                _ => {
                    warn!(reason = %reason, "Refresh failed, ending session");
                    if let Err(e) = self.inner.credentials.clear_session() {
                        error!(error = %e, "Failed to erase credentials after refresh failure");
                    }
                    self.inner.session.transition(SessionMachineInput::RefreshFailed);
                }
            },
        }

        lease.settle(outcome.clone());
        outcome
    }

    fn store_refreshed(&self, exchanged: &str, tokens: RefreshResponse) -> RefreshOutcome {
        let credentials = &self.inner.credentials;

        // Logout or a new login during the exchange replaced the session.
        match credentials.refresh_token() {
            Ok(Some(current)) if current == exchanged => {}
            Ok(_) => {
                info!("Session changed during refresh, not storing refreshed credential");
                return Ok(tokens.access);
            }
            Err(e) => warn!(error = %e, "Failed to re-read refresh credential"),
        }

        if let Err(e) = credentials.set_access_token(&tokens.access) {
            // Queued callers can still replay with the new credential.
            error!(error = %e, "Failed to persist refreshed access credential");
        }
        if let Some(rotated) = tokens.refresh.as_deref() {
            if let Err(e) = credentials.set_refresh_token(rotated) {
                error!(error = %e, "Failed to persist rotated refresh credential");
            }
        }

        Ok(tokens.access)
    }

    async fn exchange_refresh(&self, refresh: &str) -> Result<RefreshResponse, ExpiryReason> {
        let request = ApiRequest::post(REFRESH_PATH);
        let url = request
            .url(&self.inner.base_url)
            .map_err(|e| ExpiryReason::RefreshUnreachable(e.to_string()))?;
        let body = serde_json::to_value(RefreshRequest { refresh })
            .map_err(|e| ExpiryReason::MalformedRefreshResponse(e.to_string()))?;

        debug!(url = %url, "Exchanging refresh credential");
        let response = self
            .inner
            .transport
            .send(OutgoingRequest {
                method: Method::POST,
                url,
                bearer: None,
                body: Some(body),
            })
            .await
            .map_err(|e| ExpiryReason::RefreshUnreachable(e.to_string()))?;

        if !response.is_success() {
            warn!(
                status = %response.status,
                body = %summarize_response_body(&response.body),
                "Refresh rejected"
            );
            return Err(ExpiryReason::RefreshRejected {
                status: response.status,
                body: response.body,
            });
        }

        let tokens: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| ExpiryReason::MalformedRefreshResponse(e.to_string()))?;
        if tokens.access.is_empty() {
            return Err(ExpiryReason::MalformedRefreshResponse(
                "empty access credential".to_string(),
            ));
        }
        Ok(tokens)
    }

    /// Failure observation: every error leaving the client is logged here once.
    fn observe(&self, call: &PendingCall, error: ApiError) -> ApiError {
        match &error {
            ApiError::Http { status, body } => error!(
                request_id = %call.id,
                method = %call.request.method,
                path = %call.request.path,
                status = %status,
                body = %summarize_response_body(body),
                "API request failed"
            ),
            ApiError::AuthExpired(reason) => warn!(
                request_id = %call.id,
                method = %call.request.method,
                path = %call.request.path,
                reason = %reason,
                "Session expired"
            ),
            other => error!(
                request_id = %call.id,
                method = %call.request.method,
                path = %call.request.path,
                error = %other,
                "API request failed"
            ),
        }
        error
    }
}
