use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, patch_fields};

/// Raw chat object as sent by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub invite_link: Option<String>,
    pub slow_mode_delay: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// The type of a chat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    /// A type this library does not know, or none was sent.
    #[default]
    Unknown,
}

impl ChatKind {
    /// Parses the platform's chat type string.
    pub fn parse(value: &str) -> Self {
        match value {
            "private" => Self::Private,
            "group" => Self::Group,
            "supergroup" => Self::Supergroup,
            "channel" => Self::Channel,
            _ => Self::Unknown,
        }
    }

    /// Group or supergroup.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// A private conversation, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    pub invite_link: Option<String>,
    /// Minimum delay between messages per user, in seconds.
    pub slow_mode_delay: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl Entity for Chat {
    type Id = i64;
    type Payload = ChatPayload;

    const KIND: EntityKind = EntityKind::Chat;

    fn id(&self) -> i64 {
        self.id
    }

    fn identify(payload: &ChatPayload) -> Option<i64> {
        payload.id
    }

    fn from_payload(id: i64, payload: &ChatPayload) -> Self {
        let mut chat = Self {
            id,
            kind: ChatKind::Unknown,
            title: None,
            username: None,
            description: None,
            invite_link: None,
            slow_mode_delay: None,
            first_name: None,
            last_name: None,
            bio: None,
        };
        chat.apply_patch(payload);
        chat
    }

    fn apply_patch(&mut self, payload: &ChatPayload) {
        if let Some(kind) = &payload.kind {
            self.kind = ChatKind::parse(kind);
        }
        patch_fields!(
            self, payload;
            title,
            username,
            description,
            invite_link,
            slow_mode_delay,
            first_name,
            last_name,
            bio,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload() {
        let payload: ChatPayload =
            serde_json::from_str(r#"{"id": -100, "type": "supergroup", "title": "Rustaceans"}"#)
                .unwrap();
        let chat = Chat::from_payload(-100, &payload);

        assert_eq!(chat.kind, ChatKind::Supergroup);
        assert!(chat.kind.is_group());
        assert_eq!(chat.title.as_deref(), Some("Rustaceans"));
        assert_eq!(chat.bio, None);
    }

    #[test]
    fn test_unknown_type() {
        let payload: ChatPayload =
            serde_json::from_str(r#"{"id": 1, "type": "forum"}"#).unwrap();
        assert_eq!(Chat::from_payload(1, &payload).kind, ChatKind::Unknown);
    }
}
