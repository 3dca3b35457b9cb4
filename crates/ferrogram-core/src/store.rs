//! The registry of entity managers shared by transports and the dispatcher.

use serde::{Deserialize, Serialize};

use crate::cache::Capacity;
use crate::entity::{Chat, EntityKind, Member, Message, User};
use crate::manager::EntityManager;

/// Per-kind cache capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSizes {
    pub chats: Capacity,
    pub users: Capacity,
    pub members: Capacity,
    pub messages: Capacity,
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            chats: Capacity::Unbounded,
            users: Capacity::Bounded(1000),
            members: Capacity::Bounded(200),
            messages: Capacity::Bounded(200),
        }
    }
}

impl CacheSizes {
    /// Returns the capacity configured for `kind`.
    pub fn for_kind(&self, kind: EntityKind) -> Capacity {
        match kind {
            EntityKind::Chat => self.chats,
            EntityKind::User => self.users,
            EntityKind::Member => self.members,
            EntityKind::Message => self.messages,
        }
    }
}

/// One [`EntityManager`] per cached entity kind.
#[derive(Debug)]
pub struct Store {
    pub chats: EntityManager<Chat>,
    pub users: EntityManager<User>,
    pub members: EntityManager<Member>,
    pub messages: EntityManager<Message>,
}

impl Store {
    pub fn new(sizes: &CacheSizes) -> Self {
        Self {
            chats: EntityManager::new(sizes.chats),
            users: EntityManager::new(sizes.users),
            members: EntityManager::new(sizes.members),
            messages: EntityManager::new(sizes.messages),
        }
    }

    /// Applies new capacities to every manager.
    pub fn resize(&self, sizes: &CacheSizes) {
        self.chats.set_capacity(sizes.chats);
        self.users.set_capacity(sizes.users);
        self.members.set_capacity(sizes.members);
        self.messages.set_capacity(sizes.messages);
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(&CacheSizes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizes() {
        let store = Store::default();
        assert_eq!(store.chats.capacity(), Capacity::Unbounded);
        assert_eq!(store.users.capacity(), Capacity::Bounded(1000));
        assert_eq!(store.members.capacity(), Capacity::Bounded(200));
        assert_eq!(store.messages.capacity(), Capacity::Bounded(200));
    }

    #[test]
    fn test_sizes_from_partial_config() {
        let sizes: CacheSizes =
            serde_json::from_str(r#"{"users": "unbounded", "messages": 10}"#).unwrap();

        assert_eq!(sizes.for_kind(EntityKind::User), Capacity::Unbounded);
        assert_eq!(sizes.for_kind(EntityKind::Message), Capacity::Bounded(10));
        assert_eq!(sizes.for_kind(EntityKind::Member), Capacity::Bounded(200));
    }
}
