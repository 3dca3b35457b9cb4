//! Message collectors.
//!
//! A collector listens for [`BotEvent::MessageCreated`] in one chat and
//! gathers the messages that pass a filter until a limit is reached:
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use ferrogram_core::{CollectOptions, EndReason};
//!
//! // Wait up to a minute for four votes
//! let votes = events
//!     .collect_messages(
//!         chat_id,
//!         |message| message.content().is_some_and(|text| text.starts_with("/vote")),
//!         CollectOptions::new().max(4).time(Duration::from_secs(60)),
//!     )
//!     .await;
//!
//! if votes.reason == EndReason::Time {
//!     println!("Only {} out of 4 voted", votes.messages.len());
//! }
//! ```
//!
//! The listener is registered when `collect_messages` is called, not when the
//! returned future is first polled, and removed once the future completes or
//! is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::entity::{Handle, Message};
use crate::event::{BotEvent, EventBus, ListenerId};

/// When a collector stops. Unset limits never trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    /// Messages to collect, counting only those passing the filter.
    pub max: Option<usize>,
    /// Messages to look at, counting every message in the chat.
    pub max_processed: Option<usize>,
    /// How long to collect for.
    pub time: Option<Duration>,
}

impl CollectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn max_processed(mut self, max_processed: usize) -> Self {
        self.max_processed = Some(max_processed);
        self
    }

    pub fn time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }
}

/// Why a collector stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `max` messages passed the filter.
    Limit,
    /// `max_processed` messages arrived in the chat.
    ProcessedLimit,
    /// The time limit elapsed.
    Time,
    /// The bus dropped the collector's listener.
    Closed,
}

/// What a collector gathered.
#[derive(Debug, Clone)]
pub struct Collected {
    /// Accepted messages, in arrival order.
    pub messages: Vec<Handle<Message>>,
    /// Messages seen in the chat, accepted or not.
    pub processed: usize,
    pub reason: EndReason,
}

/// Counts messages against the configured limits.
struct Tally {
    options: CollectOptions,
    messages: Vec<Handle<Message>>,
    processed: usize,
}

impl Tally {
    fn new(options: CollectOptions) -> Self {
        Self {
            options,
            messages: Vec::new(),
            processed: 0,
        }
    }

    fn offer<F>(&mut self, message: Handle<Message>, filter: &F) -> Option<EndReason>
    where
        F: Fn(&Message) -> bool,
    {
        self.processed += 1;
        let accepted = filter(&message.read());
        if accepted {
            self.messages.push(message);
        }

        if self.options.max.is_some_and(|max| self.messages.len() >= max) {
            Some(EndReason::Limit)
        } else if self
            .options
            .max_processed
            .is_some_and(|max| self.processed >= max)
        {
            Some(EndReason::ProcessedLimit)
        } else {
            None
        }
    }

    fn finish(self, reason: EndReason) -> Collected {
        Collected {
            messages: self.messages,
            processed: self.processed,
            reason,
        }
    }
}

/// Removes the collector's listener when dropped.
struct Registration {
    bus: Arc<EventBus>,
    id: ListenerId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.bus.off(self.id);
    }
}

impl EventBus {
    /// Collects messages created in `chat_id` that pass `filter`.
    ///
    /// Resolves when the first of the limits in `options` is reached. With no
    /// limit set it only ends when the bus is cleared.
    pub fn collect_messages<F>(
        self: &Arc<Self>,
        chat_id: i64,
        filter: F,
        options: CollectOptions,
    ) -> impl Future<Output = Collected> + Send + 'static
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.on(move |event| {
            if let BotEvent::MessageCreated { message, .. } = event {
                if message.read().chat_id() == chat_id {
                    let _ = tx.send(message.clone());
                }
            }
        });
        let registration = Registration {
            bus: Arc::clone(self),
            id,
        };

        async move {
            let _registration = registration;
            let mut tally = Tally::new(options);

            // Zero limits end the collector before anything arrives.
            if options.max == Some(0) {
                return tally.finish(EndReason::Limit);
            }
            if options.max_processed == Some(0) {
                return tally.finish(EndReason::ProcessedLimit);
            }

            let timer = async {
                match options.time {
                    Some(time) => tokio::time::sleep(time).await,
                    None => std::future::pending().await,
                }
            };
            tokio::pin!(timer);

            let reason = loop {
                tokio::select! {
                    _ = &mut timer => break EndReason::Time,
                    received = rx.recv() => match received {
                        Some(message) => {
                            if let Some(reason) = tally.offer(message, &filter) {
                                break reason;
                            }
                        }
                        None => break EndReason::Closed,
                    },
                }
            };

            debug!(
                chat_id,
                collected = tally.messages.len(),
                processed = tally.processed,
                ?reason,
                "Message collector ended"
            );
            tally.finish(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Chat, ChatPayload, MessagePayload};
    use crate::manager::EntityManager;

    struct Fixture {
        bus: Arc<EventBus>,
        chats: EntityManager<Chat>,
        messages: EntityManager<Message>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                bus: Arc::new(EventBus::new()),
                chats: EntityManager::default(),
                messages: EntityManager::default(),
            }
        }

        fn send(&self, chat_id: i64, message_id: i64, text: &str) {
            let payload: MessagePayload = serde_json::from_value(serde_json::json!({
                "message_id": message_id,
                "chat": {"id": chat_id, "type": "group"},
                "text": text,
            }))
            .unwrap();
            let chat = self
                .chats
                .upsert(&ChatPayload { id: Some(chat_id), ..Default::default() }, None)
                .unwrap();
            let message = self.messages.upsert(&payload, None).unwrap();
            self.bus.emit(&BotEvent::MessageCreated {
                message,
                chat,
                author: None,
            });
        }
    }

    fn is_vote(message: &Message) -> bool {
        message.content().is_some_and(|text| text.starts_with("/vote"))
    }

    #[tokio::test]
    async fn test_stops_at_max() {
        let fixture = Fixture::new();
        let collector = fixture
            .bus
            .collect_messages(5, is_vote, CollectOptions::new().max(2));

        fixture.send(5, 1, "/vote yes");
        fixture.send(6, 2, "/vote elsewhere");
        fixture.send(5, 3, "chatter");
        fixture.send(5, 4, "/vote no");
        fixture.send(5, 5, "/vote late");

        let collected = collector.await;
        assert_eq!(collected.reason, EndReason::Limit);
        assert_eq!(collected.processed, 3);
        let ids: Vec<i64> = collected.messages.iter().map(|m| m.read().id()).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(fixture.bus.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_max_processed() {
        let fixture = Fixture::new();
        let collector = fixture.bus.collect_messages(
            5,
            is_vote,
            CollectOptions::new().max(10).max_processed(2),
        );

        fixture.send(5, 1, "hello");
        fixture.send(5, 2, "/vote yes");
        fixture.send(5, 3, "/vote no");

        let collected = collector.await;
        assert_eq!(collected.reason, EndReason::ProcessedLimit);
        assert_eq!(collected.processed, 2);
        assert_eq!(collected.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_time() {
        let fixture = Fixture::new();
        let collector = fixture.bus.collect_messages(
            5,
            is_vote,
            CollectOptions::new().max(4).time(Duration::from_secs(60)),
        );

        fixture.send(5, 1, "/vote yes");

        let collected = collector.await;
        assert_eq!(collected.reason, EndReason::Time);
        assert_eq!(collected.messages.len(), 1);
        assert!(fixture.bus.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_collector_unregisters() {
        let fixture = Fixture::new();
        let collector = fixture
            .bus
            .collect_messages(5, is_vote, CollectOptions::new().max(1));
        assert_eq!(fixture.bus.len(), 1);

        drop(collector);
        assert!(fixture.bus.is_empty());
    }

    #[tokio::test]
    async fn test_cleared_bus_closes_collector() {
        let fixture = Fixture::new();
        let collector = fixture
            .bus
            .collect_messages(5, is_vote, CollectOptions::new());

        fixture.send(5, 1, "/vote yes");
        fixture.bus.clear();

        let collected = collector.await;
        assert_eq!(collected.reason, EndReason::Closed);
        assert_eq!(collected.messages.len(), 1);
    }
}
