use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use tokio_test::assert_ok;
use tower::ServiceExt;

use ferrogram_core::{BotEvent, Envelope, EventBus, Handle, Message, Store, UpdateSink};
use ferrogram_framework::{CommandRouter, UpdateDispatcher};
use ferrogram_transport::{PushConfig, PushError, PushTransport};

#[derive(Default)]
struct RecordingSink {
    update_ids: Mutex<Vec<Option<i64>>>,
}

#[async_trait]
impl UpdateSink for RecordingSink {
    async fn process(&self, envelope: Envelope) {
        self.update_ids.lock().push(envelope.update_id);
    }
}

fn receiver(config: PushConfig) -> (PushTransport, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (PushTransport::with_config(sink.clone(), &config), sink)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn hook_config() -> PushConfig {
    PushConfig {
        path: "/hook".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn valid_update_is_dispatched() {
    let (push, sink) = receiver(hook_config());

    let response = push
        .router()
        .oneshot(post("/hook", r#"{"update_id": 42, "message": {"message_id": 1, "chat": {"id": 5}}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*sink.update_ids.lock(), vec![Some(42)]);
}

#[tokio::test]
async fn other_paths_and_methods_are_not_handled() {
    let (push, sink) = receiver(hook_config());

    let wrong_path = push
        .router()
        .oneshot(post("/other", r#"{"update_id": 1}"#))
        .await
        .unwrap();
    assert_eq!(wrong_path.status(), StatusCode::IM_A_TEAPOT);

    let wrong_method = push
        .router()
        .oneshot(Request::builder().uri("/hook").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), StatusCode::IM_A_TEAPOT);

    assert!(sink.update_ids.lock().is_empty());
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (push, sink) = receiver(hook_config());

    for body in ["{not json", r#""just a string""#] {
        let response = push.router().oneshot(post("/hook", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    assert!(sink.update_ids.lock().is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (push, sink) = receiver(PushConfig {
        max_body_bytes: 16,
        ..hook_config()
    });

    let body = json!({"update_id": 1, "message": {"message_id": 1, "chat": {"id": 5}}}).to_string();
    let response = push.router().oneshot(post("/hook", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(sink.update_ids.lock().is_empty());
}

#[tokio::test]
async fn secret_token_is_enforced() {
    let (push, sink) = receiver(PushConfig {
        secret_token: Some("s3cret".into()),
        ..hook_config()
    });

    let missing = push
        .router()
        .oneshot(post("/hook", r#"{"update_id": 1}"#))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let mut request = post("/hook", r#"{"update_id": 2}"#);
    request.headers_mut().insert(
        "x-telegram-bot-api-secret-token",
        "s3cret".parse().unwrap(),
    );
    let accepted = push.router().oneshot(request).await.unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    assert_eq!(*sink.update_ids.lock(), vec![Some(2)]);
}

#[tokio::test]
async fn set_path_moves_the_endpoint() {
    let (push, sink) = receiver(PushConfig::default());
    push.set_path("bot-updates");
    assert_eq!(push.path(), "/bot-updates");

    let old = push.router().oneshot(post("/", r#"{"update_id": 1}"#)).await.unwrap();
    assert_eq!(old.status(), StatusCode::IM_A_TEAPOT);

    let new = push
        .router()
        .oneshot(post("/bot-updates", r#"{"update_id": 2}"#))
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);
    assert_eq!(*sink.update_ids.lock(), vec![Some(2)]);
}

#[derive(Default)]
struct Pings {
    args: Mutex<Vec<Vec<String>>>,
}

#[tokio::test]
async fn pushed_command_reaches_router() {
    let store = Arc::new(Store::default());
    let events = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        events.on(move |event: &BotEvent| seen.lock().push(event.name()));
    }

    let router = Arc::new(CommandRouter::new(Arc::new(Pings::default())));
    router
        .on(
            "ping",
            |owner: Arc<Pings>, _message: Handle<Message>, args: Vec<String>| async move {
                owner.args.lock().push(args);
            },
        )
        .unwrap();

    let dispatcher = Arc::new(UpdateDispatcher::new(store.clone(), events, router.clone()));
    let push = PushTransport::new(dispatcher);

    let body = json!({
        "message": {
            "message_id": 1,
            "from": {"id": 9},
            "chat": {"id": 5, "type": "private"},
            "text": "/ping"
        }
    });
    let response = push
        .router()
        .oneshot(post("/", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*seen.lock(), vec!["raw", "message_created"]);
    assert!(store.chats.contains(&5));
    assert!(store.users.contains(&9));
    assert_eq!(*router.owner().args.lock(), vec![Vec::<String>::new()]);
}

#[tokio::test]
async fn server_lifecycle() {
    let (push, sink) = receiver(PushConfig::default());

    let addr = assert_ok!(push.create_server("/hook", "127.0.0.1", 0, None).await);
    assert_eq!(push.local_addr().await, Some(addr));
    assert!(matches!(
        push.create_server("/hook", "127.0.0.1", 0, None).await,
        Err(PushError::AlreadyRunning(running)) if running == addr
    ));

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/hook"))
        .json(&json!({"update_id": 9, "message": {"message_id": 1, "chat": {"id": 5}}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(*sink.update_ids.lock(), vec![Some(9)]);

    assert!(push.close().await);
    assert!(!push.close().await);
    assert_eq!(push.local_addr().await, None);
}
