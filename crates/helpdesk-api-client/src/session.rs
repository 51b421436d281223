//! Sign-in, sign-out and session probing on top of [`ApiClient`].

use crate::claims::AccessClaims;
use crate::session_fsm::{SessionMachineInput, SessionState};
use crate::transport::ApiRequest;
use crate::{ApiClient, ApiError, ApiResult};
use chrono::{DateTime, Utc};
use helpdesk_storage::UserProfile;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
/// Protected endpoint used to probe whether a stored session still works.
pub const PROBE_PATH: &str = "/api/tickets/";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Account details for self-registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Point-in-time view of the stored session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// A refresh credential is stored.
    pub signed_in: bool,
    pub profile: Option<UserProfile>,
    /// Expiry read from the access credential, when it is a JWT.
    pub access_expires_at: Option<DateTime<Utc>>,
    /// The access credential's expiry has passed. The next request will
    /// refresh it.
    pub access_expired: bool,
}

/// Session lifecycle operations.
#[derive(Debug, Clone)]
pub struct SessionService {
    client: ApiClient,
}

impl SessionService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Exchange a username and password for a credential pair and store it
    /// along with the returned profile.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Option<UserProfile>> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(&LoginRequest { username, password })?;
        let response: LoginResponse = self.client.send_unauthenticated(request).await?.json()?;

        let credentials = self.client.credentials();
        credentials.set_session(&response.access, &response.refresh)?;
        if let Some(profile) = &response.user {
            credentials.set_user_profile(profile)?;
            info!(user_id = profile.id, role = %profile.role, "Signed in");
        } else {
            info!(username, "Signed in");
        }

        self.client.record(SessionMachineInput::CredentialsStored);
        Ok(response.user)
    }

    /// Create an account, then sign in with it.
    pub async fn register(&self, account: &RegisterRequest) -> ApiResult<Option<UserProfile>> {
        let request = ApiRequest::post(REGISTER_PATH).with_json(account)?;
        self.client.send_unauthenticated(request).await?;
        info!(username = %account.username, "Account registered");

        self.login(&account.username, &account.password).await
    }

    /// Erase both credentials and the stored profile.
    pub fn logout(&self) -> ApiResult<()> {
        self.client.credentials().clear_session()?;
        self.client.record(SessionMachineInput::LogoutRequested);
        info!("Signed out");
        Ok(())
    }

    /// Erase whatever is left of the session when `error` reports that it
    /// expired. Returns whether it did.
    pub fn end_if_expired(&self, error: &ApiError) -> ApiResult<bool> {
        let ApiError::AuthExpired(reason) = error else {
            return Ok(false);
        };
        warn!(reason = %reason, "Session expired, clearing stored credentials");
        self.logout()?;
        Ok(true)
    }

    /// Check that the stored session can still reach a protected endpoint.
    ///
    /// An expired access credential is refreshed on the way. A session that
    /// cannot be recovered is erased and reported as `false`; any other
    /// failure is returned.
    pub async fn validate_session(&self) -> ApiResult<bool> {
        if self.client.credentials().access_token()?.is_none() {
            debug!("No access credential stored");
            return Ok(false);
        }

        match self.client.request(ApiRequest::get(PROBE_PATH)).await {
            Ok(_) => Ok(true),
            Err(e) if self.end_if_expired(&e)? => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the stored session without touching the network.
    pub fn status(&self) -> ApiResult<SessionSnapshot> {
        let credentials = self.client.credentials();
        let claims = credentials
            .access_token()?
            .as_deref()
            .and_then(AccessClaims::decode_unverified);

        Ok(SessionSnapshot {
            state: self.client.session_state(),
            signed_in: credentials.has_session()?,
            profile: credentials.user_profile()?,
            access_expires_at: claims.as_ref().and_then(AccessClaims::expires_at),
            access_expired: claims.is_some_and(|claims| claims.is_expired_at(Utc::now())),
        })
    }
}
