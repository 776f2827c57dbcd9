use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlements::EntitlementState;
use crate::errors::CoreResult;
use crate::types::matching::{DiscoveryFilters, Match, SwipeAck};
use crate::types::messaging::{Message, OutgoingMessage};
use crate::types::profile::Profile;

// --- Wire envelope ---

/// Success envelope the collaborator wraps every payload in.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }
}

/// Error envelope: `{ "success": false, "error": { "code", "message" } }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

// --- Request DTOs ---

#[derive(Debug, Serialize, Deserialize)]
pub struct SwipeRequest {
    pub target_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportRequest {
    pub target_id: Uuid,
    pub reason: String,
}

// --- The collaborator boundary ---

/// Everything the core consumes from the collaborator, one method per
/// operation. The production implementation is [`HttpApi`]; tests use the
/// in-memory collaborator.
///
/// [`HttpApi`]: crate::clients::http::HttpApi
#[async_trait]
pub trait MatchmakerApi: Send + Sync {
    async fn discovery(&self, filters: &DiscoveryFilters) -> CoreResult<Vec<Profile>>;
    async fn profile(&self, user_id: Uuid) -> CoreResult<Profile>;

    async fn like(&self, target_id: Uuid) -> CoreResult<SwipeAck>;
    async fn pass(&self, target_id: Uuid) -> CoreResult<()>;
    async fn wink(&self, target_id: Uuid) -> CoreResult<()>;

    async fn matches(&self) -> CoreResult<Vec<Match>>;
    async fn messages(&self, match_id: Uuid) -> CoreResult<Vec<Message>>;
    async fn send_message(&self, outgoing: &OutgoingMessage) -> CoreResult<Message>;
    async fn delete_message(&self, message_id: Uuid) -> CoreResult<()>;

    async fn subscription_status(&self) -> CoreResult<EntitlementState>;
    async fn who_liked_me(&self) -> CoreResult<Vec<Profile>>;
    async fn who_viewed_me(&self) -> CoreResult<Vec<Profile>>;

    async fn block(&self, target_id: Uuid) -> CoreResult<()>;
    async fn unblock(&self, target_id: Uuid) -> CoreResult<()>;
    async fn report(&self, target_id: Uuid, reason: &str) -> CoreResult<()>;
    async fn blocked_users(&self) -> CoreResult<Vec<Uuid>>;
}
