//! Interaction payloads that are delivered once and never cached.

use serde::{Deserialize, Serialize};

use super::{Handle, Message, MessagePayload, User, UserPayload};
use crate::payload::lenient;

/// A point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

/// Raw callback query, sent when a user presses an inline keyboard button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackQueryPayload {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<UserPayload>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<MessagePayload>,
    pub inline_message_id: Option<String>,
    pub chat_instance: Option<String>,
    pub data: Option<String>,
    pub game_short_name: Option<String>,
}

/// A pressed inline keyboard button.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Option<Handle<User>>,
    /// The message the button was attached to, if it is still accessible.
    pub message: Option<Handle<Message>>,
    pub inline_message_id: Option<String>,
    pub chat_instance: Option<String>,
    pub data: Option<String>,
    pub game_short_name: Option<String>,
}

/// Raw inline query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineQueryPayload {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<UserPayload>,
    pub query: Option<String>,
    pub offset: Option<String>,
    pub chat_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
}

/// A query typed after the bot's username in any chat.
#[derive(Debug, Clone)]
pub struct InlineQuery {
    pub id: String,
    pub from: Option<Handle<User>>,
    pub query: String,
    pub offset: String,
    pub chat_type: Option<String>,
    pub location: Option<Location>,
}

/// Raw chosen inline result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChosenInlineResultPayload {
    pub result_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<UserPayload>,
    pub query: Option<String>,
    pub inline_message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
}

/// An inline result the user picked and sent.
#[derive(Debug, Clone)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: Option<Handle<User>>,
    pub query: String,
    pub inline_message_id: Option<String>,
    pub location: Option<Location>,
}
