//! The value command handlers receive.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use ferrogram_core::{EventBus, Handle, Message, MessagePayload, Store};
use ferrogram_transport::{BotApi, TransportError, TransportResult};

/// Shared state handed to every command handler.
///
/// ```rust,ignore
/// runtime.commands().on("ping", |ctx: Arc<BotContext>, message: Handle<Message>, _args: Vec<String>| async move {
///     ctx.reply(&message, "pong!").await.map(|_| ())
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct BotContext {
    api: Arc<BotApi>,
    store: Arc<Store>,
    events: Arc<EventBus>,
}

impl BotContext {
    pub fn new(api: Arc<BotApi>, store: Arc<Store>, events: Arc<EventBus>) -> Self {
        Self { api, store, events }
    }

    pub fn api(&self) -> &Arc<BotApi> {
        &self.api
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Sends `text` to `chat_id` and caches the sent message.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> TransportResult<Handle<Message>> {
        self.send_message(json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    /// Answers `message` in its chat, quoting it.
    pub async fn reply(
        &self,
        message: &Handle<Message>,
        text: &str,
    ) -> TransportResult<Handle<Message>> {
        let (chat_id, message_id) = {
            let message = message.read();
            (message.chat_id(), message.id())
        };

        self.send_message(json!({
            "chat_id": chat_id,
            "text": text,
            "reply_parameters": { "message_id": message_id },
        }))
        .await
    }

    async fn send_message(&self, params: Value) -> TransportResult<Handle<Message>> {
        let sent: MessagePayload = self.api.call("sendMessage", &params).await?;
        let handle = self
            .store
            .messages
            .upsert(&sent, None)
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;

        {
            let message = handle.read();
            debug!(chat_id = message.chat_id(), message_id = message.id(), "Sent message");
        }
        Ok(handle)
    }
}
