use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use ferrogram_core::{BotEvent, Envelope, EventBus, Handle, Message, MessageKey, Store};
use ferrogram_framework::{BotIdentity, CommandRouter, UpdateDispatcher};

#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<(String, i64, Vec<String>)>>,
}

fn setup() -> (UpdateDispatcher<Recorder>, Arc<Mutex<Vec<BotEvent>>>) {
    let store = Arc::new(Store::default());
    let events = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        events.on(move |event| seen.lock().push(event.clone()));
    }

    let router = Arc::new(CommandRouter::new(Arc::new(Recorder::default())));
    router
        .on(
            "ping",
            |owner: Arc<Recorder>, message: Handle<Message>, args: Vec<String>| async move {
                let id = message.read().id();
                owner.commands.lock().push(("ping".to_owned(), id, args));
            },
        )
        .unwrap();

    (UpdateDispatcher::new(store, events, router), seen)
}

fn names(events: &[BotEvent]) -> Vec<&'static str> {
    events.iter().map(BotEvent::name).collect()
}

#[tokio::test]
async fn text_command_creates_entities_and_triggers_router() {
    let (dispatcher, seen) = setup();

    let envelope = Envelope::from_value(json!({
        "message": {
            "message_id": 1,
            "from": {"id": 9},
            "chat": {"id": 5, "type": "private"},
            "text": "/ping",
        }
    }))
    .unwrap();
    dispatcher.dispatch(envelope).await;

    assert_eq!(names(&seen.lock()), vec!["raw", "message_created"]);
    assert!(dispatcher.store().chats.contains(&5));
    assert!(dispatcher.store().users.contains(&9));

    let commands = dispatcher.router().owner().commands.lock();
    assert_eq!(*commands, vec![("ping".to_owned(), 1, Vec::new())]);
}

#[tokio::test]
async fn command_addressed_to_other_bot_is_ignored() {
    let (dispatcher, _seen) = setup();
    dispatcher.set_me(BotIdentity {
        id: 1,
        username: Some("ferrobot".into()),
    });

    for (id, text) in [(1, "/ping@otherbot"), (2, "/PING@FerroBot now")] {
        let envelope = Envelope::from_value(json!({
            "update_id": id,
            "message": {"message_id": id, "chat": {"id": 5}, "text": text}
        }))
        .unwrap();
        dispatcher.dispatch(envelope).await;
    }

    let commands = dispatcher.router().owner().commands.lock();
    assert_eq!(*commands, vec![("ping".to_owned(), 2, vec!["now".to_owned()])]);
}

#[tokio::test]
async fn edit_of_uncached_message_has_no_previous() {
    let (dispatcher, seen) = setup();

    let envelope = Envelope::from_value(json!({
        "update_id": 20,
        "edited_message": {
            "message_id": 77,
            "chat": {"id": 5, "type": "private"},
            "from": {"id": 9},
            "edit_date": 1700000000,
            "text": "fixed typo",
        }
    }))
    .unwrap();
    dispatcher.dispatch(envelope).await;

    let seen = seen.lock();
    assert_eq!(names(&seen), vec!["raw", "message_updated"]);
    let BotEvent::MessageUpdated { previous, current } = &seen[1] else {
        panic!("expected message_updated, got {}", seen[1].name());
    };
    assert!(previous.is_none());
    assert_eq!(current.read().text.as_deref(), Some("fixed typo"));
}

#[tokio::test]
async fn edit_of_cached_message_pairs_previous_state() {
    let (dispatcher, seen) = setup();

    for (update_id, variant, text) in [(1, "message", "helo"), (2, "edited_message", "hello")] {
        let envelope = Envelope::from_value(json!({
            "update_id": update_id,
            variant: {"message_id": 3, "chat": {"id": 5}, "from": {"id": 9}, "text": text}
        }))
        .unwrap();
        dispatcher.dispatch(envelope).await;
    }

    let seen = seen.lock();
    let BotEvent::MessageCreated { message, .. } = &seen[1] else {
        panic!("expected message_created");
    };
    let BotEvent::MessageUpdated { previous, current } = &seen[3] else {
        panic!("expected message_updated");
    };

    assert_eq!(previous.as_ref().unwrap().text.as_deref(), Some("helo"));
    assert!(current.ptr_eq(message));
    assert_eq!(message.read().text.as_deref(), Some("hello"));
    assert_eq!(current.read().key, MessageKey::new(5, 3));
}
