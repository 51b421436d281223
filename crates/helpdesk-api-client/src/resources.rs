//! Typed access to the backend collections.
//!
//! Payloads stay `serde_json::Value`; the backend owns their shape.

use crate::transport::ApiRequest;
use crate::{ApiClient, ApiError, ApiResult};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

/// Ticket status code for a closed ticket.
pub const TICKET_STATUS_CLOSED: u8 = 2;

/// A REST collection under `/api/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Tickets,
    Users,
    KnowledgeBase,
    CannedResponses,
    SlaSettings,
    CommentThreads,
    Comments,
    Faqs,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Tickets,
        Resource::Users,
        Resource::KnowledgeBase,
        Resource::CannedResponses,
        Resource::SlaSettings,
        Resource::CommentThreads,
        Resource::Comments,
        Resource::Faqs,
    ];

    pub fn segment(&self) -> &'static str {
        match self {
            Resource::Tickets => "tickets",
            Resource::Users => "users",
            Resource::KnowledgeBase => "knowledge-base",
            Resource::CannedResponses => "canned-responses",
            Resource::SlaSettings => "sla-settings",
            Resource::CommentThreads => "comment-threads",
            Resource::Comments => "comments",
            Resource::Faqs => "faqs",
        }
    }

    pub fn collection_path(&self) -> String {
        format!("/api/{}/", self.segment())
    }

    pub fn item_path(&self, id: i64) -> String {
        format!("/api/{}/{}/", self.segment(), id)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.segment() == s)
            .ok_or_else(|| format!("unknown resource: {}", s))
    }
}

/// Collection operations and the few special endpoints.
#[derive(Debug, Clone)]
pub struct HelpdeskApi {
    client: ApiClient,
}

impl HelpdeskApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn list(&self, resource: Resource) -> ApiResult<Value> {
        self.client.get_json(&resource.collection_path()).await
    }

    pub async fn get(&self, resource: Resource, id: i64) -> ApiResult<Value> {
        self.client.get_json(&resource.item_path(id)).await
    }

    pub async fn create(&self, resource: Resource, body: &Value) -> ApiResult<Value> {
        self.client.post_json(&resource.collection_path(), body).await
    }

    /// Partial update.
    pub async fn update(&self, resource: Resource, id: i64, body: &Value) -> ApiResult<Value> {
        self.client.patch_json(&resource.item_path(id), body).await
    }

    pub async fn remove(&self, resource: Resource, id: i64) -> ApiResult<()> {
        self.client.delete(&resource.item_path(id)).await
    }

    pub async fn close_ticket(&self, id: i64) -> ApiResult<Value> {
        self.update(Resource::Tickets, id, &json!({ "status": TICKET_STATUS_CLOSED }))
            .await
    }

    pub async fn search_knowledge_base(&self, query: &str) -> ApiResult<Value> {
        let request = ApiRequest::get("/api/knowledge-base/search/").with_query("q", query);
        self.client.request(request).await?.json()
    }

    pub async fn suggest_articles(&self, query: &str) -> ApiResult<Value> {
        let request = ApiRequest::get("/api/knowledge-base/suggest/").with_query("q", query);
        self.client.request(request).await?.json()
    }

    pub async fn ticket_analytics(&self) -> ApiResult<Value> {
        self.client.get_json("/api/tickets/analytics/").await
    }

    /// Send a message to the support chatbot.
    pub async fn chat(&self, message: &str) -> ApiResult<Value> {
        self.client
            .post_json("/api/chat/", &json!({ "message": message }))
            .await
    }

    /// Post a comment on a ticket, creating its thread first if the ticket
    /// has none.
    pub async fn post_comment(&self, ticket_id: i64, text: &str) -> ApiResult<Value> {
        let ticket = self.get(Resource::Tickets, ticket_id).await?;

        let thread_id = match ticket.get("thread_id").and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                debug!(ticket_id, "Ticket has no comment thread, creating one");
                let thread = self
                    .create(Resource::CommentThreads, &json!({ "ticket": ticket_id }))
                    .await?;
                thread.get("id").and_then(Value::as_i64).ok_or_else(|| {
                    ApiError::Json(serde::de::Error::custom("comment thread response has no id"))
                })?
            }
        };

        self.create(
            Resource::Comments,
            &json!({ "thread": thread_id, "comment": text }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(Resource::Tickets.collection_path(), "/api/tickets/");
        assert_eq!(Resource::SlaSettings.item_path(3), "/api/sla-settings/3/");
    }

    #[test]
    fn test_parse_resource() {
        for resource in Resource::ALL {
            assert_eq!(resource.segment().parse::<Resource>(), Ok(resource));
        }
        assert!("tickets/".parse::<Resource>().is_err());
    }
}
