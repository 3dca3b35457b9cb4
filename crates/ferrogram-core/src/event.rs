//! Typed events and the listener bus.
//!
//! The dispatcher turns every envelope into one or more [`BotEvent`]s and
//! hands them to an [`EventBus`]. Listeners run synchronously, in
//! registration order. A listener that returns an error or panics is logged
//! and skipped; the remaining listeners still run.
//!
//! Registering returns a [`ListenerId`] that [`EventBus::off`] takes to
//! remove the listener again.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{error, warn};

use crate::entity::{
    CallbackQuery, Chat, ChosenInlineResult, Handle, InlineQuery, Member, Message, User,
};
use crate::envelope::Envelope;

/// An event produced from one inbound update.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// The bot's own identity was fetched.
    Ready { me: Handle<User> },
    /// Every envelope, before classification.
    Raw(Arc<Envelope>),
    MessageCreated {
        message: Handle<Message>,
        chat: Handle<Chat>,
        author: Option<Handle<User>>,
    },
    MessageUpdated {
        /// The cached state before this edit, if the message was cached.
        previous: Option<Message>,
        current: Handle<Message>,
    },
    ChatMemberAdded {
        chat: Handle<Chat>,
        member: Handle<Member>,
        /// Who added the member. Equals the member for self-joins.
        author: Option<Handle<User>>,
    },
    ChatMemberRemoved {
        chat: Handle<Chat>,
        member: Handle<Member>,
        author: Option<Handle<User>>,
    },
    /// The bot itself was added to a chat.
    ChatJoined {
        chat: Handle<Chat>,
        author: Option<Handle<User>>,
    },
    /// The bot itself left or was removed from a chat.
    ChatLeft {
        chat: Handle<Chat>,
        author: Option<Handle<User>>,
    },
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    InlineResultChosen(ChosenInlineResult),
}

impl BotEvent {
    /// Stable event name, for logs and filtering.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Raw(_) => "raw",
            Self::MessageCreated { .. } => "message_created",
            Self::MessageUpdated { .. } => "message_updated",
            Self::ChatMemberAdded { .. } => "chat_member_added",
            Self::ChatMemberRemoved { .. } => "chat_member_removed",
            Self::ChatJoined { .. } => "chat_joined",
            Self::ChatLeft { .. } => "chat_left",
            Self::CallbackQuery(_) => "callback_query",
            Self::InlineQuery(_) => "inline_query",
            Self::InlineResultChosen(_) => "inline_result_chosen",
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Listener = Arc<dyn Fn(&BotEvent) -> Result<(), BoxError> + Send + Sync>;

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of event observers.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Registers an infallible listener.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&BotEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(move |event: &BotEvent| {
            listener(event);
            Ok(())
        }))
    }

    /// Registers a listener whose errors are logged.
    pub fn try_on<F, E>(&self, listener: F) -> ListenerId
    where
        F: Fn(&BotEvent) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.register(Arc::new(move |event: &BotEvent| {
            listener(event).map_err(Into::into)
        }))
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// Listeners registered while an emit is running see the next event.
    pub fn emit(&self, event: &BotEvent) {
        let listeners = self.listeners.read().clone();

        for (index, (_, listener)) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event = event.name(), listener = index, error = %err, "Event listener failed");
                }
                Err(_) => {
                    error!(event = event.name(), listener = index, "Event listener panicked");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
