//! The seam between the poll loop and the Bot API.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::TransportResult;

/// Parameters of one long-poll request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatesRequest {
    /// First update to return. Omitted on the very first request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Long-poll wait, in seconds.
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
}

/// Where the poll loop fetches updates from.
///
/// Updates are returned as raw JSON so that one malformed update cannot fail
/// the whole batch.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches the next batch of updates.
    async fn get_updates(&self, request: &UpdatesRequest) -> TransportResult<Vec<Value>>;

    /// Removes a registered webhook, resolving a poll conflict.
    async fn delete_webhook(&self, drop_pending_updates: bool) -> TransportResult<()>;
}
