//! Bot API client.
//!
//! [`BotApi`] wraps a `reqwest` client and speaks the platform's
//! `POST {api_url}/bot{token}/{method}` protocol. Every call sends a JSON body
//! and unwraps the `{ok, result}` envelope, turning `{ok: false}` answers into
//! [`TransportError::Api`].
//!
//! ```rust,ignore
//! use ferrogram_transport::BotApi;
//!
//! let api = BotApi::new("https://api.telegram.org", token)?;
//! let me = api.get_me().await?;
//! api.call::<serde_json::Value>(
//!     "sendMessage",
//!     &serde_json::json!({"chat_id": 5, "text": "pong!"}),
//! )
//! .await?;
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{TransportError, TransportResult};
use crate::source::{UpdateSource, UpdatesRequest};
use ferrogram_core::UserPayload;

/// The public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default timeout for regular calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Added to the long-poll wait so the server can answer before the client gives up.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// Optional parameters of `setWebhook`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_pending_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

/// Current webhook status, from `getWebhookInfo`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookInfo {
    /// Empty when no webhook is set.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pending_update_count: u64,
    pub last_error_date: Option<i64>,
    pub last_error_message: Option<String>,
    pub max_connections: Option<u32>,
    pub allowed_updates: Option<Vec<String>>,
}

impl WebhookInfo {
    pub fn is_set(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<Value>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// HTTP client for the Bot API.
#[derive(Clone)]
pub struct BotApi {
    client: Client,
    /// `{api_url}/bot{token}`. Contains the token; never logged.
    base: String,
}

impl BotApi {
    /// Creates a client with the default request timeout.
    pub fn new(api_url: &str, token: &str) -> TransportResult<Self> {
        Self::with_timeout(api_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose regular calls time out after `timeout`.
    pub fn with_timeout(api_url: &str, token: &str, timeout: Duration) -> TransportResult<Self> {
        if token.trim().is_empty() {
            return Err(TransportError::InvalidConfig("bot token is empty".into()));
        }
        let client = ClientBuilder::new().timeout(timeout).build()?;

        Ok(Self {
            client,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token.trim()),
        })
    }

    /// Calls an arbitrary Bot API method.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &impl Serialize,
    ) -> TransportResult<T> {
        self.request(method, params, None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &impl Serialize,
        timeout: Option<Duration>,
    ) -> TransportResult<T> {
        trace!(method, "Calling Bot API");

        let mut request = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let parsed: ApiResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(TransportError::api(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown error"),
                ));
            }
            Err(err) => return Err(TransportError::InvalidResponse(err.to_string())),
        };

        if !parsed.ok {
            let code = parsed.error_code.unwrap_or_else(|| status.as_u16());
            let description = parsed.description.unwrap_or_default();
            debug!(method, code, description = %description, "Bot API returned an error");
            return Err(TransportError::Api {
                code,
                description,
                retry_after: parsed.parameters.and_then(|p| p.retry_after),
            });
        }

        serde_json::from_value(parsed.result.unwrap_or(Value::Null))
            .map_err(|err| TransportError::InvalidResponse(format!("{method}: {err}")))
    }

    /// Fetches the bot's own account.
    pub async fn get_me(&self) -> TransportResult<UserPayload> {
        self.call("getMe", &json!({})).await
    }

    /// Long-polls for updates. The request timeout is extended by the poll wait.
    pub async fn get_updates(&self, request: &UpdatesRequest) -> TransportResult<Vec<Value>> {
        let timeout = Duration::from_secs(request.timeout) + LONG_POLL_MARGIN;
        self.request("getUpdates", request, Some(timeout)).await
    }

    /// Registers a webhook at `url`.
    pub async fn set_webhook(&self, url: &str, options: &WebhookOptions) -> TransportResult<bool> {
        let mut params = serde_json::to_value(options)
            .map_err(|err| TransportError::InvalidConfig(err.to_string()))?;
        if let Value::Object(map) = &mut params {
            map.insert("url".to_owned(), Value::String(url.to_owned()));
        }
        self.call("setWebhook", &params).await
    }

    /// Removes the webhook, switching the bot back to long polling.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> TransportResult<bool> {
        self.call(
            "deleteWebhook",
            &json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
    }

    pub async fn get_webhook_info(&self) -> TransportResult<WebhookInfo> {
        self.call("getWebhookInfo", &json!({})).await
    }
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi").finish_non_exhaustive()
    }
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn get_updates(&self, request: &UpdatesRequest) -> TransportResult<Vec<Value>> {
        BotApi::get_updates(self, request).await
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> TransportResult<()> {
        BotApi::delete_webhook(self, drop_pending_updates)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            BotApi::new(DEFAULT_API_URL, "  "),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_updates_request_body() {
        let request = UpdatesRequest {
            offset: None,
            limit: Some(100),
            timeout: 30,
            allowed_updates: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"limit": 100, "timeout": 30})
        );
    }

    #[test]
    fn test_webhook_info_parse() {
        let info: WebhookInfo =
            serde_json::from_value(json!({"url": "", "pending_update_count": 3})).unwrap();
        assert!(!info.is_set());
        assert_eq!(info.pending_update_count, 3);
    }
}
