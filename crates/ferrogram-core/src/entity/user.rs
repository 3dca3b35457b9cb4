use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, patch_fields};

/// Raw user object as sent by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Option<i64>,
    pub is_bot: Option<bool>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl UserPayload {
    /// Creates a payload carrying only an id.
    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

/// A platform user or bot account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl User {
    /// First and last name joined by a space, if either is known.
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.clone()),
            (None, None) => None,
        }
    }

    /// `@username`, if the user has one.
    pub fn tag(&self) -> Option<String> {
        self.username.as_ref().map(|name| format!("@{name}"))
    }
}

impl Entity for User {
    type Id = i64;
    type Payload = UserPayload;

    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> i64 {
        self.id
    }

    fn identify(payload: &UserPayload) -> Option<i64> {
        payload.id
    }

    fn from_payload(id: i64, payload: &UserPayload) -> Self {
        Self {
            id,
            is_bot: payload.is_bot.unwrap_or(false),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            username: payload.username.clone(),
            language_code: payload.language_code.clone(),
        }
    }

    fn apply_patch(&mut self, payload: &UserPayload) {
        if let Some(is_bot) = payload.is_bot {
            self.is_bot = is_bot;
        }
        patch_fields!(self, payload; first_name, last_name, username, language_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_keeps_absent_fields() {
        let first: UserPayload = serde_json::from_str(
            r#"{"id": 9, "first_name": "Ada", "username": "ada", "language_code": "en"}"#,
        )
        .unwrap();
        let mut user = User::from_payload(9, &first);

        let second: UserPayload =
            serde_json::from_str(r#"{"id": 9, "username": "lovelace"}"#).unwrap();
        user.apply_patch(&second);

        assert_eq!(user.username.as_deref(), Some("lovelace"));
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.language_code.as_deref(), Some("en"));
        assert!(!user.is_bot);
    }

    #[test]
    fn test_names() {
        let user = User::from_payload(
            1,
            &UserPayload {
                first_name: Some("Grace".into()),
                last_name: Some("Hopper".into()),
                ..UserPayload::with_id(1)
            },
        );
        assert_eq!(user.full_name().as_deref(), Some("Grace Hopper"));
        assert_eq!(user.tag(), None);
    }
}
