use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ChatPayload, Entity, EntityKind, Location, UserPayload, patch_fields};
use crate::payload::{lenient, lenient_list};

/// Identifies a message. Message ids are only unique within one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageKey {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// A formatted span inside a message's text or caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    /// Start, in UTF-16 code units.
    pub offset: usize,
    /// Length, in UTF-16 code units.
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MessageEntity {
    /// Returns the slice of `text` this entity covers.
    ///
    /// Returns `None` when the range does not fall on character boundaries of
    /// `text` or runs past its end.
    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = utf16_to_byte_index(text, self.offset)?;
        let end = utf16_to_byte_index(text, self.offset.checked_add(self.length)?)?;
        text.get(start..end)
    }
}

fn utf16_to_byte_index(text: &str, utf16_index: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units == utf16_index {
            return Some(byte);
        }
        units += ch.len_utf16();
        if units > utf16_index {
            return None;
        }
    }
    (units == utf16_index).then_some(text.len())
}

/// Raw message object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub from: Option<UserPayload>,
    #[serde(default, deserialize_with = "lenient")]
    pub sender_chat: Option<ChatPayload>,
    #[serde(default, deserialize_with = "lenient")]
    pub chat: Option<ChatPayload>,
    pub date: Option<i64>,
    pub edit_date: Option<i64>,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub entities: Option<Vec<MessageEntity>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub caption_entities: Option<Vec<MessageEntity>>,
    #[serde(default, deserialize_with = "lenient")]
    pub reply_to_message: Option<Box<MessagePayload>>,
    #[serde(default, deserialize_with = "lenient")]
    pub forward_from: Option<UserPayload>,
    #[serde(default, deserialize_with = "lenient")]
    pub forward_from_chat: Option<ChatPayload>,
    pub forward_from_message_id: Option<i64>,
    pub forward_signature: Option<String>,
    pub forward_sender_name: Option<String>,
    pub forward_date: Option<i64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub new_chat_members: Option<Vec<UserPayload>>,
    #[serde(default, deserialize_with = "lenient")]
    pub left_chat_member: Option<UserPayload>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
    /// Fields without a typed counterpart (media objects, service markers).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessagePayload {
    /// The message key, if both the chat id and the message id are present.
    pub fn key(&self) -> Option<MessageKey> {
        let chat_id = self.chat.as_ref()?.id?;
        Some(MessageKey::new(chat_id, self.message_id?))
    }

    /// Whether this message announces members joining.
    pub fn has_new_members(&self) -> bool {
        self.new_chat_members
            .as_ref()
            .is_some_and(|members| !members.is_empty())
    }

    /// Whether this message announces a member leaving.
    pub fn has_left_member(&self) -> bool {
        self.left_chat_member.is_some()
    }

    /// Classifies the content carried by this payload.
    pub fn content_kind(&self) -> MessageKind {
        if self.text.is_some() {
            return MessageKind::Text;
        }
        if self.location.is_some() && !self.extra.contains_key("venue") {
            return MessageKind::Location;
        }
        if self.has_new_members() || self.has_left_member() {
            return MessageKind::Service;
        }
        MEDIA_KEYS
            .iter()
            .find(|(key, _)| self.extra.contains_key(*key))
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| {
                if SERVICE_KEYS.iter().any(|key| self.extra.contains_key(*key)) {
                    MessageKind::Service
                } else {
                    MessageKind::Unknown
                }
            })
    }
}

/// Checked in order: an animation message also carries a `document`.
const MEDIA_KEYS: &[(&str, MessageKind)] = &[
    ("animation", MessageKind::Animation),
    ("audio", MessageKind::Audio),
    ("document", MessageKind::Document),
    ("photo", MessageKind::Photo),
    ("sticker", MessageKind::Sticker),
    ("video", MessageKind::Video),
    ("video_note", MessageKind::VideoNote),
    ("voice", MessageKind::Voice),
    ("contact", MessageKind::Contact),
    ("dice", MessageKind::Dice),
    ("poll", MessageKind::Poll),
    ("venue", MessageKind::Venue),
];

const SERVICE_KEYS: &[&str] = &[
    "new_chat_title",
    "new_chat_photo",
    "delete_chat_photo",
    "group_chat_created",
    "supergroup_chat_created",
    "channel_chat_created",
    "migrate_to_chat_id",
    "migrate_from_chat_id",
    "pinned_message",
];

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Animation,
    Audio,
    Document,
    Photo,
    Sticker,
    Video,
    VideoNote,
    Voice,
    Contact,
    Dice,
    Poll,
    Venue,
    Location,
    /// Membership changes, pins, title changes and other chat events.
    Service,
    Unknown,
}

/// A message in a chat or channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub key: MessageKey,
    pub kind: MessageKind,
    /// Sending user. Absent for channel posts and anonymous admins.
    pub author_id: Option<i64>,
    pub sender_chat_id: Option<i64>,
    /// Send time, as a unix timestamp.
    pub date: Option<i64>,
    pub edit_date: Option<i64>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub entities: Vec<MessageEntity>,
    pub caption_entities: Vec<MessageEntity>,
    pub reply_to_message_id: Option<i64>,
    pub forward_from_id: Option<i64>,
    pub forward_from_chat_id: Option<i64>,
    pub forward_from_message_id: Option<i64>,
    pub forward_signature: Option<String>,
    pub forward_sender_name: Option<String>,
    pub forward_date: Option<i64>,
    pub location: Option<Location>,
}

impl Message {
    pub fn id(&self) -> i64 {
        self.key.message_id
    }

    pub fn chat_id(&self) -> i64 {
        self.key.chat_id
    }

    /// The text, or the caption for media messages.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    pub fn is_edited(&self) -> bool {
        self.edit_date.is_some()
    }

    pub fn is_forwarded(&self) -> bool {
        self.forward_date.is_some()
    }
}

impl Entity for Message {
    type Id = MessageKey;
    type Payload = MessagePayload;

    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> MessageKey {
        self.key
    }

    fn identify(payload: &MessagePayload) -> Option<MessageKey> {
        payload.key()
    }

    fn from_payload(key: MessageKey, payload: &MessagePayload) -> Self {
        let mut message = Self {
            key,
            kind: MessageKind::Unknown,
            author_id: None,
            sender_chat_id: None,
            date: None,
            edit_date: None,
            text: None,
            caption: None,
            entities: Vec::new(),
            caption_entities: Vec::new(),
            reply_to_message_id: None,
            forward_from_id: None,
            forward_from_chat_id: None,
            forward_from_message_id: None,
            forward_signature: None,
            forward_sender_name: None,
            forward_date: None,
            location: None,
        };
        message.apply_patch(payload);
        message
    }

    fn apply_patch(&mut self, payload: &MessagePayload) {
        let kind = payload.content_kind();
        if kind != MessageKind::Unknown {
            self.kind = kind;
        }

        if let Some(id) = payload.from.as_ref().and_then(|user| user.id) {
            self.author_id = Some(id);
        }
        if let Some(id) = payload.sender_chat.as_ref().and_then(|chat| chat.id) {
            self.sender_chat_id = Some(id);
        }
        if let Some(id) = payload.reply_to_message.as_ref().and_then(|reply| reply.message_id) {
            self.reply_to_message_id = Some(id);
        }
        if let Some(id) = payload.forward_from.as_ref().and_then(|user| user.id) {
            self.forward_from_id = Some(id);
        }
        if let Some(id) = payload.forward_from_chat.as_ref().and_then(|chat| chat.id) {
            self.forward_from_chat_id = Some(id);
        }
        if let Some(entities) = &payload.entities {
            self.entities = entities.clone();
        }
        if let Some(entities) = &payload.caption_entities {
            self.caption_entities = entities.clone();
        }

        patch_fields!(
            self, payload;
            date,
            edit_date,
            text,
            caption,
            forward_from_message_id,
            forward_signature,
            forward_sender_name,
            forward_date,
            location,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> MessagePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_key_requires_chat() {
        assert_eq!(parse(r#"{"message_id": 1, "text": "hi"}"#).key(), None);
        assert_eq!(
            parse(r#"{"message_id": 1, "chat": {"id": 5}}"#).key(),
            Some(MessageKey::new(5, 1))
        );
    }

    #[test]
    fn test_malformed_sender_degrades_to_none() {
        let payload = parse(r#"{"message_id": 1, "chat": {"id": 5}, "from": "oops", "text": "x"}"#);
        assert!(payload.from.is_none());

        let message = Message::from_payload(MessageKey::new(5, 1), &payload);
        assert_eq!(message.author_id, None);
        assert_eq!(message.content(), Some("x"));
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(parse(r#"{"photo": []}"#).content_kind(), MessageKind::Photo);
        assert_eq!(
            parse(r#"{"animation": {}, "document": {}}"#).content_kind(),
            MessageKind::Animation
        );
        assert_eq!(
            parse(r#"{"new_chat_members": [{"id": 2}]}"#).content_kind(),
            MessageKind::Service
        );
        assert_eq!(parse(r#"{}"#).content_kind(), MessageKind::Unknown);
    }

    #[test]
    fn test_edit_patch_keeps_unsent_fields() {
        let key = MessageKey::new(5, 1);
        let mut message = Message::from_payload(
            key,
            &parse(r#"{"message_id": 1, "chat": {"id": 5}, "from": {"id": 9}, "date": 10, "text": "helo"}"#),
        );
        message.apply_patch(&parse(
            r#"{"message_id": 1, "chat": {"id": 5}, "edit_date": 20, "text": "hello"}"#,
        ));

        assert_eq!(message.text.as_deref(), Some("hello"));
        assert_eq!(message.author_id, Some(9));
        assert_eq!(message.date, Some(10));
        assert!(message.is_edited());
    }

    #[test]
    fn test_entity_extract_counts_utf16() {
        let text = "🦀 /ping now";
        let entity = MessageEntity {
            kind: "bot_command".into(),
            offset: 3,
            length: 5,
            url: None,
            language: None,
        };
        assert_eq!(entity.extract(text), Some("/ping"));

        let past_end = MessageEntity {
            offset: 40,
            ..entity
        };
        assert_eq!(past_end.extract(text), None);
    }

    #[test]
    fn test_entity_extract_rejects_overflowing_length() {
        let payload = parse(
            r#"{"message_id": 1, "chat": {"id": 5}, "text": "hi",
                "entities": [{"type": "bold", "offset": 1, "length": 18446744073709551615}]}"#,
        );
        let entities = payload.entities.unwrap();

        assert_eq!(entities[0].length, usize::MAX);
        assert_eq!(entities[0].extract("hi"), None);
    }
}
