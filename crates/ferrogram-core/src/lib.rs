//! Core types for the Ferrogram bot framework.
//!
//! This crate holds everything the ingestion pipeline shares, independent of
//! how updates arrive:
//!
//! - [`BoundedCache`]: insertion-ordered storage with oldest-first eviction
//! - [`entity`]: typed chats, users, members and messages, with their raw payloads
//! - [`EntityManager`] and [`Store`]: identity-preserving caches per entity kind
//! - [`Envelope`]: one raw inbound update
//! - [`BotEvent`] and [`EventBus`]: typed events and their listeners
//! - [`collector`]: awaiting a batch of messages from one chat
//! - [`UpdateSink`]: the trait transports deliver envelopes to
//!
//! Transports live in `ferrogram-transport`; classification and command
//! routing live in `ferrogram-framework`.

pub mod cache;
pub mod collector;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod event;
pub mod manager;
mod payload;
pub mod sink;
pub mod store;

pub use cache::{BoundedCache, Capacity};
pub use collector::{CollectOptions, Collected, EndReason};
pub use entity::{
    CallbackQuery, CallbackQueryPayload, Chat, ChatKind, ChatPayload, ChosenInlineResult,
    ChosenInlineResultPayload, Entity, EntityKind, Handle, InlineQuery, InlineQueryPayload,
    Location, Member, MemberKey, MemberPayload, MemberStatus, Message, MessageEntity, MessageKey,
    MessageKind, MessagePayload, User, UserPayload,
};
pub use envelope::{Envelope, UpdateKind};
pub use error::{CoreError, CoreResult};
pub use event::{BotEvent, EventBus, ListenerId};
pub use manager::{EntityManager, Resolvable};
pub use sink::{BoxedSink, UpdateSink};
pub use store::{CacheSizes, Store};
