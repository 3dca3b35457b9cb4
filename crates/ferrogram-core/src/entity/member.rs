use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, User, UserPayload, patch_fields};
use crate::payload::lenient;

/// Identifies a member: a user scoped to one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl MemberKey {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// Raw chat member object.
///
/// The platform does not put the chat id inside member objects; `chat_id` is
/// filled in by whoever knows which chat the member was seen in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<UserPayload>,
    pub status: Option<String>,
    pub custom_title: Option<String>,
    pub is_anonymous: Option<bool>,
    pub until_date: Option<i64>,
}

impl MemberPayload {
    /// Builds a member payload for `user` seen in `chat_id`.
    pub fn seen(chat_id: i64, user: UserPayload) -> Self {
        Self {
            chat_id: Some(chat_id),
            user: Some(user),
            ..Default::default()
        }
    }

    /// Sets the status field.
    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.status = Some(status.as_str().to_owned());
        self
    }
}

/// A member's standing in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MemberStatus {
    Creator,
    Administrator,
    #[default]
    Member,
    Restricted,
    Left,
    Kicked,
    Other(String),
}

impl MemberStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "creator" => Self::Creator,
            "administrator" => Self::Administrator,
            "member" => Self::Member,
            "restricted" => Self::Restricted,
            "left" => Self::Left,
            "kicked" => Self::Kicked,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creator => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Kicked => "kicked",
            Self::Other(other) => other,
        }
    }

    /// Whether the user is currently part of the chat.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Left | Self::Kicked)
    }
}

/// A user's membership in one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub key: MemberKey,
    /// The member's user fields as last seen in this chat.
    pub user: User,
    pub status: MemberStatus,
    pub custom_title: Option<String>,
    pub is_anonymous: Option<bool>,
    /// When restrictions are lifted, as a unix timestamp.
    pub until_date: Option<i64>,
}

impl Member {
    pub fn chat_id(&self) -> i64 {
        self.key.chat_id
    }

    pub fn user_id(&self) -> i64 {
        self.key.user_id
    }

    /// Whether a restriction end date is set.
    pub fn is_restricted(&self) -> bool {
        self.until_date.is_some_and(|date| date > 0)
    }
}

impl Entity for Member {
    type Id = MemberKey;
    type Payload = MemberPayload;

    const KIND: EntityKind = EntityKind::Member;

    fn id(&self) -> MemberKey {
        self.key
    }

    fn identify(payload: &MemberPayload) -> Option<MemberKey> {
        let user_id = payload.user.as_ref()?.id?;
        Some(MemberKey::new(payload.chat_id?, user_id))
    }

    fn from_payload(key: MemberKey, payload: &MemberPayload) -> Self {
        let user = payload
            .user
            .as_ref()
            .map(|user| User::from_payload(key.user_id, user))
            .unwrap_or_else(|| User::from_payload(key.user_id, &UserPayload::default()));

        let mut member = Self {
            key,
            user,
            status: MemberStatus::default(),
            custom_title: None,
            is_anonymous: None,
            until_date: None,
        };
        member.patch_own_fields(payload);
        member
    }

    fn apply_patch(&mut self, payload: &MemberPayload) {
        if let Some(user) = &payload.user {
            self.user.apply_patch(user);
        }
        self.patch_own_fields(payload);
    }
}

impl Member {
    fn patch_own_fields(&mut self, payload: &MemberPayload) {
        if let Some(status) = &payload.status {
            self.status = MemberStatus::parse(status);
        }
        patch_fields!(self, payload; custom_title, is_anonymous, until_date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_needs_chat_and_user() {
        let mut payload: MemberPayload =
            serde_json::from_str(r#"{"user": {"id": 9}, "status": "administrator"}"#).unwrap();
        assert_eq!(Member::identify(&payload), None);

        payload.chat_id = Some(5);
        assert_eq!(Member::identify(&payload), Some(MemberKey::new(5, 9)));
    }

    #[test]
    fn test_patch_updates_user_and_status() {
        let key = MemberKey::new(5, 9);
        let mut member = Member::from_payload(key, &MemberPayload::seen(5, UserPayload::with_id(9)));
        assert_eq!(member.status, MemberStatus::Member);

        let patch = MemberPayload {
            user: Some(UserPayload {
                username: Some("ada".into()),
                ..UserPayload::with_id(9)
            }),
            custom_title: Some("admin".into()),
            ..MemberPayload::seen(5, UserPayload::with_id(9))
        }
        .with_status(MemberStatus::Administrator);
        member.apply_patch(&patch);

        assert_eq!(member.status, MemberStatus::Administrator);
        assert_eq!(member.user.username.as_deref(), Some("ada"));
        assert_eq!(member.custom_title.as_deref(), Some("admin"));
        assert!(!member.is_restricted());
    }
}
