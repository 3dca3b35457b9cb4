//! Envelope classification and event emission.
//!
//! The [`UpdateDispatcher`] is the [`UpdateSink`] both transports deliver to.
//! For every envelope it:
//!
//! 1. Emits [`BotEvent::Raw`] with the whole envelope
//! 2. Classifies the envelope by its populated variant
//! 3. Upserts every referenced chat, user, member and message into the [`Store`]
//! 4. Emits the typed event
//! 5. Forwards prefixed text messages to the [`CommandRouter`]
//!
//! Membership changes travel inside a `message` payload, so they are checked
//! before plain messages. A malformed sub-payload is logged and treated as
//! absent; `process` itself never fails.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::command::{CommandRouter, parse_command};
use ferrogram_core::{
    BotEvent, CallbackQuery, CallbackQueryPayload, Chat, ChatPayload, ChosenInlineResult,
    ChosenInlineResultPayload, Entity, EntityKind, Envelope, EventBus, Handle, InlineQuery,
    InlineQueryPayload, Member, MemberPayload, MemberStatus, Message, MessagePayload, Store,
    UpdateSink, User, UserPayload,
};

/// The authenticated bot's own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

impl From<&User> for BotIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Turns envelopes into cached entities, typed events and command calls.
pub struct UpdateDispatcher<C> {
    store: Arc<Store>,
    events: Arc<EventBus>,
    router: Arc<CommandRouter<C>>,
    me: RwLock<Option<BotIdentity>>,
}

impl<C: Send + Sync + 'static> UpdateDispatcher<C> {
    pub fn new(store: Arc<Store>, events: Arc<EventBus>, router: Arc<CommandRouter<C>>) -> Self {
        Self {
            store,
            events,
            router,
            me: RwLock::new(None),
        }
    }

    /// Sets the bot's own identity, used to detect joins and leaves of the
    /// bot itself and to accept `/cmd@botname` commands.
    pub fn set_me(&self, me: BotIdentity) {
        *self.me.write() = Some(me);
    }

    pub fn me(&self) -> Option<BotIdentity> {
        self.me.read().clone()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn router(&self) -> &Arc<CommandRouter<C>> {
        &self.router
    }

    /// Classifies and handles one envelope.
    pub async fn dispatch(&self, envelope: Envelope) {
        let envelope = Arc::new(envelope);
        let update_id = envelope.update_id;
        trace!(?update_id, kind = ?envelope.kind(), "Dispatching update");

        self.events.emit(&BotEvent::Raw(Arc::clone(&envelope)));

        if let Some(message) = &envelope.message {
            if message.has_new_members() {
                self.on_members_added(message);
            } else if message.has_left_member() {
                self.on_member_left(message);
            } else {
                self.on_message(message).await;
            }
        } else if let Some(post) = &envelope.channel_post {
            self.on_message(post).await;
        } else if let Some(edited) = envelope
            .edited_message
            .as_ref()
            .or(envelope.edited_channel_post.as_ref())
        {
            self.on_message_edited(edited);
        } else if let Some(query) = &envelope.callback_query {
            self.on_callback_query(query);
        } else if let Some(query) = &envelope.inline_query {
            self.on_inline_query(query);
        } else if let Some(result) = &envelope.chosen_inline_result {
            self.on_inline_result_chosen(result);
        } else {
            debug!(?update_id, "Update carries no supported variant");
        }
    }

    // ------------------------------------------------------------------------
    // Handlers per variant
    // ------------------------------------------------------------------------

    async fn on_message(&self, payload: &MessagePayload) {
        let Some(chat) = self.upsert_chat(payload.chat.as_ref()) else {
            warn!(message_id = ?payload.message_id, "Dropping message without a usable chat");
            return;
        };
        let chat_id = chat.read().id;
        let author = self.upsert_author(chat_id, payload.from.as_ref());

        let message = match self.store.messages.upsert(payload, None) {
            Ok(message) => message,
            Err(err) => {
                warn!(chat_id, error = %err, "Dropping message");
                return;
            }
        };

        self.events.emit(&BotEvent::MessageCreated {
            message: message.clone(),
            chat,
            author,
        });

        self.route_command(message).await;
    }

    fn on_message_edited(&self, payload: &MessagePayload) {
        let Some(chat) = self.upsert_chat(payload.chat.as_ref()) else {
            warn!(message_id = ?payload.message_id, "Dropping edit without a usable chat");
            return;
        };
        let chat_id = chat.read().id;
        self.upsert_author(chat_id, payload.from.as_ref());

        match self.store.messages.upsert_with_previous(payload, None) {
            Ok((current, previous)) => {
                self.events
                    .emit(&BotEvent::MessageUpdated { previous, current });
            }
            Err(err) => warn!(chat_id, error = %err, "Dropping edited message"),
        }
    }

    fn on_members_added(&self, payload: &MessagePayload) {
        let Some(chat) = self.upsert_chat(payload.chat.as_ref()) else {
            warn!("Dropping member update without a usable chat");
            return;
        };
        let chat_id = chat.read().id;
        let author = self.upsert_user(payload.from.as_ref());
        let me = self.me_id();

        for user in payload.new_chat_members.iter().flatten() {
            let Some(user_id) = user.id else {
                warn!(chat_id, "Skipping added member without an id");
                continue;
            };
            self.upsert_user(Some(user));
            let Some(member) = self.upsert_member(
                MemberPayload::seen(chat_id, user.clone()).with_status(MemberStatus::Member),
            ) else {
                continue;
            };

            let event = if me == Some(user_id) {
                debug!(chat_id, "Bot joined chat");
                BotEvent::ChatJoined {
                    chat: chat.clone(),
                    author: author.clone(),
                }
            } else {
                BotEvent::ChatMemberAdded {
                    chat: chat.clone(),
                    member,
                    author: author.clone(),
                }
            };
            self.events.emit(&event);
        }
    }

    fn on_member_left(&self, payload: &MessagePayload) {
        let Some(chat) = self.upsert_chat(payload.chat.as_ref()) else {
            warn!("Dropping member update without a usable chat");
            return;
        };
        let chat_id = chat.read().id;
        let author = self.upsert_user(payload.from.as_ref());

        let Some(user) = &payload.left_chat_member else {
            return;
        };
        let Some(user_id) = user.id else {
            warn!(chat_id, "Skipping departed member without an id");
            return;
        };
        self.upsert_user(Some(user));
        let Some(member) = self.upsert_member(
            MemberPayload::seen(chat_id, user.clone()).with_status(MemberStatus::Left),
        ) else {
            return;
        };

        let event = if self.me_id() == Some(user_id) {
            debug!(chat_id, "Bot left chat");
            BotEvent::ChatLeft { chat, author }
        } else {
            BotEvent::ChatMemberRemoved {
                chat,
                member,
                author,
            }
        };
        self.events.emit(&event);
    }

    fn on_callback_query(&self, payload: &CallbackQueryPayload) {
        let Some(id) = payload.id.clone() else {
            warn!("Dropping callback query without an id");
            return;
        };
        let from = self.upsert_user(payload.from.as_ref());
        let message = payload.message.as_ref().and_then(|message| {
            self.upsert_chat(message.chat.as_ref())?;
            self.store
                .messages
                .upsert(message, None)
                .inspect_err(|err| debug!(error = %err, "Callback query message not cached"))
                .ok()
        });

        self.events.emit(&BotEvent::CallbackQuery(CallbackQuery {
            id,
            from,
            message,
            inline_message_id: payload.inline_message_id.clone(),
            chat_instance: payload.chat_instance.clone(),
            data: payload.data.clone(),
            game_short_name: payload.game_short_name.clone(),
        }));
    }

    fn on_inline_query(&self, payload: &InlineQueryPayload) {
        let Some(id) = payload.id.clone() else {
            warn!("Dropping inline query without an id");
            return;
        };

        self.events.emit(&BotEvent::InlineQuery(InlineQuery {
            id,
            from: self.upsert_user(payload.from.as_ref()),
            query: payload.query.clone().unwrap_or_default(),
            offset: payload.offset.clone().unwrap_or_default(),
            chat_type: payload.chat_type.clone(),
            location: payload.location.clone(),
        }));
    }

    fn on_inline_result_chosen(&self, payload: &ChosenInlineResultPayload) {
        let Some(result_id) = payload.result_id.clone() else {
            warn!("Dropping chosen inline result without an id");
            return;
        };

        self.events
            .emit(&BotEvent::InlineResultChosen(ChosenInlineResult {
                result_id,
                from: self.upsert_user(payload.from.as_ref()),
                query: payload.query.clone().unwrap_or_default(),
                inline_message_id: payload.inline_message_id.clone(),
                location: payload.location.clone(),
            }));
    }

    async fn route_command(&self, message: Handle<Message>) {
        let Some(text) = message.read().text.clone() else {
            return;
        };
        let prefix = self.router.prefix();
        if !text.starts_with(&prefix) {
            return;
        }

        let username = self.me.read().as_ref().and_then(|me| me.username.clone());
        let Some(command) = parse_command(&prefix, &text, username.as_deref()) else {
            trace!("Prefixed text is not a command for this bot");
            return;
        };

        debug!(command = %command.name, args = command.args.len(), "Routing command");
        self.router
            .trigger(&command.name, message, command.args)
            .await;
    }

    // ------------------------------------------------------------------------
    // Entity helpers
    // ------------------------------------------------------------------------

    fn me_id(&self) -> Option<i64> {
        self.me.read().as_ref().map(|me| me.id)
    }

    fn upsert_chat(&self, payload: Option<&ChatPayload>) -> Option<Handle<Chat>> {
        upsert_logged(&self.store.chats, payload?)
    }

    fn upsert_user(&self, payload: Option<&UserPayload>) -> Option<Handle<User>> {
        upsert_logged(&self.store.users, payload?)
    }

    fn upsert_member(&self, payload: MemberPayload) -> Option<Handle<Member>> {
        upsert_logged(&self.store.members, &payload)
    }

    /// Upserts a message sender as a user and as a member of `chat_id`.
    fn upsert_author(&self, chat_id: i64, from: Option<&UserPayload>) -> Option<Handle<User>> {
        let from = from?;
        let author = self.upsert_user(Some(from))?;
        self.upsert_member(MemberPayload::seen(chat_id, from.clone()));
        Some(author)
    }
}

fn upsert_logged<T: Entity>(
    manager: &ferrogram_core::EntityManager<T>,
    payload: &T::Payload,
) -> Option<Handle<T>> {
    manager
        .upsert(payload, None)
        .inspect_err(|err| {
            let kind: EntityKind = T::KIND;
            debug!(%kind, error = %err, "Treating malformed sub-payload as absent");
        })
        .ok()
}

#[async_trait]
impl<C: Send + Sync + 'static> UpdateSink for UpdateDispatcher<C> {
    async fn process(&self, envelope: Envelope) {
        self.dispatch(envelope).await;
    }
}
