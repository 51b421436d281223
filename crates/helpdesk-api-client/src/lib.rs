//! Helpdesk API client.
//!
//! This crate provides:
//! - An authenticated HTTP client that refreshes expired credentials
//! - A single shared refresh exchange for concurrent 401s
//! - Sign-in, registration and session probing
//! - Typed helpers for the backend collections
//! - An FSM-based observable session state

mod claims;
mod client;
mod error;
mod refresh;
mod resources;
mod session;
mod session_fsm;
mod transport;

pub use claims::AccessClaims;
pub use client::{ApiClient, REFRESH_PATH};
pub use error::{ApiError, ApiResult, ExpiryReason};
pub use refresh::{GateEntry, RefreshGate, RefreshLease, RefreshOutcome};
pub use resources::{HelpdeskApi, Resource, TICKET_STATUS_CLOSED};
pub use session::{
    RegisterRequest, SessionService, SessionSnapshot, LOGIN_PATH, PROBE_PATH, REGISTER_PATH,
};
pub use session_fsm::session_machine;
pub use session_fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState, SessionStateCallback,
    SessionStateChanged,
};
pub use reqwest::{Method, StatusCode};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, OutgoingRequest, ReqwestTransport};

#[cfg(test)]
mod tests;
