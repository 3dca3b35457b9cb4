//! Typed entities normalized from platform payloads.
//!
//! Every cached entity kind implements [`Entity`]: it knows how to compute its
//! key from a payload, how to build itself from a first sighting, and how to
//! patch itself from a later one. Cached instances are shared through
//! [`Handle`]s, so every holder observes later patches.
//!
//! # Patch semantics
//!
//! [`Entity::apply_patch`] overwrites every attribute whose payload field is
//! present and leaves every other attribute untouched.

mod chat;
mod member;
mod message;
mod query;
mod user;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use chat::{Chat, ChatKind, ChatPayload};
pub use member::{Member, MemberKey, MemberPayload, MemberStatus};
pub use message::{Message, MessageEntity, MessageKey, MessageKind, MessagePayload};
pub use query::{
    CallbackQuery, CallbackQueryPayload, ChosenInlineResult, ChosenInlineResultPayload,
    InlineQuery, InlineQueryPayload, Location,
};
pub use user::{User, UserPayload};

/// The cached entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Chat,
    User,
    Member,
    Message,
}

impl EntityKind {
    /// Returns the lowercase name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::User => "user",
            Self::Member => "member",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized, cacheable platform object.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Key identifying one instance within its kind.
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Raw payload this entity is built from.
    type Payload;

    /// The kind tag used in errors and logs.
    const KIND: EntityKind;

    /// Returns this entity's key.
    fn id(&self) -> Self::Id;

    /// Computes the key carried by `payload`, if the identity fields are present.
    fn identify(payload: &Self::Payload) -> Option<Self::Id>;

    /// Builds a new entity under `id` from its first sighting.
    fn from_payload(id: Self::Id, payload: &Self::Payload) -> Self;

    /// Overwrites every attribute whose field is present in `payload`.
    fn apply_patch(&mut self, payload: &Self::Payload);
}

/// Shared reference to a cached entity.
///
/// Clones point at the same instance. Patches happen under the write lock, so
/// a reader never sees a half-applied patch.
pub struct Handle<T>(Arc<RwLock<T>>);

impl<T> Handle<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Returns a copy of the entity's current state.
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.0.read().clone()
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&*self.0.read()).finish()
    }
}

/// Copies every present `Option` field of a payload onto the same-named attribute.
macro_rules! patch_fields {
    ($target:expr, $payload:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$payload.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

pub(crate) use patch_fields;
