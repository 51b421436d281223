//! CLI command implementations.

mod auth;
mod kb;
mod raw;
mod support;
mod tickets;

pub use auth::{login, logout, register, status};
pub use kb::{kb_search, kb_suggest};
pub use raw::raw_request;
pub use support::{chat, comment};
pub use tickets::{tickets_close, tickets_create, tickets_delete, tickets_list, tickets_show};

use crate::output::OutputFormat;
use anyhow::Result;
use helpdesk_api_client::{ApiClient, HelpdeskApi, SessionService, SessionState};
use helpdesk_config_and_utils::{Config, Paths};
use helpdesk_storage::create_credential_store;
use std::sync::Arc;
use tracing::warn;

/// Everything a command needs to talk to the backend.
pub struct Context {
    pub api: HelpdeskApi,
    pub session: SessionService,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(paths: &Paths, config: &Config, format: OutputFormat) -> Result<Self> {
        let credentials = Arc::new(create_credential_store(paths)?);
        let client = ApiClient::from_config(config, credentials)?;

        client.set_session_callback(Arc::new(|change| {
            if change.state == SessionState::SignedOut && change.previous == SessionState::Refreshing {
                warn!("Session ended after a failed refresh");
            }
        }));

        Ok(Self {
            api: HelpdeskApi::new(client.clone()),
            session: SessionService::new(client),
            format,
        })
    }

    pub fn client(&self) -> &ApiClient {
        self.api.client()
    }
}
