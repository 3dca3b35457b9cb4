//! Raw update envelopes.
//!
//! An [`Envelope`] is one inbound record from the platform. It carries a
//! numeric `update_id` and one payload variant. Every variant is parsed
//! leniently: a broken variant becomes `None` instead of failing the envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{
    CallbackQueryPayload, ChosenInlineResultPayload, InlineQueryPayload, MessagePayload,
};
use crate::error::{CoreError, CoreResult};
use crate::payload::lenient;

/// Which payload variant an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    InlineQuery,
    ChosenInlineResult,
}

impl UpdateKind {
    /// The field name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
        }
    }
}

/// One raw update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Strictly increasing sequence number. Pushed bodies may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<MessagePayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub edited_message: Option<MessagePayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel_post: Option<MessagePayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub edited_channel_post: Option<MessagePayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_query: Option<CallbackQueryPayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub inline_query: Option<InlineQueryPayload>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub chosen_inline_result: Option<ChosenInlineResultPayload>,
    /// Variants this library does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Parses an envelope from a JSON body.
    pub fn from_slice(body: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(body).map_err(|e| CoreError::malformed_other("envelope", e.to_string()))
    }

    /// Converts an already parsed JSON value.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| CoreError::malformed_other("envelope", e.to_string()))
    }

    /// Returns the first populated variant.
    pub fn kind(&self) -> Option<UpdateKind> {
        if self.message.is_some() {
            Some(UpdateKind::Message)
        } else if self.edited_message.is_some() {
            Some(UpdateKind::EditedMessage)
        } else if self.channel_post.is_some() {
            Some(UpdateKind::ChannelPost)
        } else if self.edited_channel_post.is_some() {
            Some(UpdateKind::EditedChannelPost)
        } else if self.callback_query.is_some() {
            Some(UpdateKind::CallbackQuery)
        } else if self.inline_query.is_some() {
            Some(UpdateKind::InlineQuery)
        } else if self.chosen_inline_result.is_some() {
            Some(UpdateKind::ChosenInlineResult)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_envelope() {
        let envelope = Envelope::from_slice(
            br#"{"update_id": 100, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"}, "text": "/ping"}}"#,
        )
        .unwrap();

        assert_eq!(envelope.update_id, Some(100));
        assert_eq!(envelope.kind(), Some(UpdateKind::Message));
        assert_eq!(envelope.message.unwrap().text.as_deref(), Some("/ping"));
    }

    #[test]
    fn test_unknown_variant_kept_in_extra() {
        let envelope = Envelope::from_slice(br#"{"update_id": 7, "poll_answer": {"poll_id": "x"}}"#)
            .unwrap();

        assert_eq!(envelope.kind(), None);
        assert!(envelope.extra.contains_key("poll_answer"));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = Envelope::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedPayload { kind: "envelope", .. }));
        assert!(Envelope::from_slice(br#"{"update_id": "x"}"#).is_err());
    }

    #[test]
    fn test_broken_variant_degrades() {
        let envelope =
            Envelope::from_slice(br#"{"update_id": 3, "callback_query": [1, 2]}"#).unwrap();
        assert_eq!(envelope.kind(), None);
    }
}
