//! API client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a session could not be recovered after a 401.
///
/// Every variant ends the session; they are kept apart so the shell can
/// tell a rejected credential from an unreachable token service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpiryReason {
    /// No refresh credential was stored.
    #[error("no refresh credential stored")]
    MissingRefreshCredential,
    /// The refresh endpoint answered with a non-2xx status.
    #[error("refresh rejected with HTTP {status}")]
    RefreshRejected { status: StatusCode, body: String },
    /// The refresh exchange got no response (connect failure, timeout).
    #[error("refresh endpoint unreachable: {0}")]
    RefreshUnreachable(String),
    /// The refresh endpoint answered 2xx without a usable `access` field.
    #[error("malformed refresh response: {0}")]
    MalformedRefreshResponse(String),
    /// The refresh task stopped before settling (runtime shutdown, panic).
    #[error("refresh interrupted")]
    RefreshInterrupted,
}

/// API client error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure: no response was received (includes timeouts)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response other than a recoverable 401
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// 401 that could not be recovered; the session is over
    #[error("Session expired: {0}")]
    AuthExpired(ExpiryReason),

    /// Credential storage error
    #[error("Storage error: {0}")]
    Storage(#[from] helpdesk_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] helpdesk_config_and_utils::CoreError),
}

impl ApiError {
    /// True when the session ended and the user must sign in again.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired(_))
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the caller may reasonably retry.
    ///
    /// Transient errors are network failures and 5xx responses. The client
    /// itself never retries them.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
