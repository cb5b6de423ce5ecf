//! End-to-End: presence channel join/leave ordering (spec §8 scenario 3).
//!
//! Two sessions subscribe to the same `presence-` channel; the second
//! subscriber must see the first in its `__subscribed.subscribers` list, and
//! the first subscriber must see a `__memberJoined` for the second. When the
//! second session disconnects, the first sees `__memberLeft`.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use webrocket_core::Context;
use webrocket_storage::SledStorage;

struct Harness {
    frontend_addr: std::net::SocketAddr,
    context: Arc<Context>,
    _tmp: tempfile::TempDir,
}

async fn spawn_server() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let storage: Arc<dyn webrocket_core::Storage> = Arc::new(SledStorage::open(tmp.path()).unwrap());
    let context = Arc::new(Context::bootstrap(storage).unwrap());
    context.add_vhost("/test").unwrap();
    context.vhost("/test").unwrap().open_channel("presence-lobby").unwrap();
    let state = server::AppState::new(context.clone());

    let frontend_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let frontend_addr = frontend_listener.local_addr().unwrap();
    let frontend_router = server::build_frontend_router(state);
    tokio::spawn(async move {
        axum::serve(frontend_listener, frontend_router).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Harness {
        frontend_addr,
        context,
        _tmp: tmp,
    }
}

async fn next_json(ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin)) -> Value {
    match ws.next().await.unwrap().unwrap() {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn mint_token(harness: &Harness, pattern: &str) -> String {
    harness
        .context
        .vhost("/test")
        .unwrap()
        .generate_single_access_token(pattern)
        .unwrap()
}

async fn authed_connection(harness: &Harness, token: &str) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let url = format!("ws://{}/test", harness.frontend_addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let _connected = next_json(&mut ws).await;
    ws.send(Message::Text(json!({"auth":{"token":token}}).to_string().into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"__authenticated":{}}));
    ws
}

#[tokio::test]
async fn presence_join_and_leave_notify_existing_subscribers_in_order() {
    let harness = spawn_server().await;

    let token1 = mint_token(&harness, "presence-.*").await;
    let mut alice = authed_connection(&harness, &token1).await;
    alice
        .send(Message::Text(
            json!({"subscribe":{"channel":"presence-lobby","data":{"name":"alice"}}})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let reply = next_json(&mut alice).await;
    assert_eq!(reply, json!({"__subscribed":{"channel":"presence-lobby"}}));

    let token2 = mint_token(&harness, "presence-.*").await;
    let mut bob = authed_connection(&harness, &token2).await;
    bob.send(Message::Text(
        json!({"subscribe":{"channel":"presence-lobby","data":{"name":"bob"}}})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let bob_reply = next_json(&mut bob).await;
    assert_eq!(
        bob_reply,
        json!({"__subscribed":{"channel":"presence-lobby","subscribers":[{"name":"alice"}]}})
    );

    let joined = next_json(&mut alice).await;
    assert_eq!(joined["__memberJoined"]["name"], "bob");
    assert_eq!(joined["__memberJoined"]["channel"], "presence-lobby");

    bob.send(Message::Close(None)).await.unwrap();
    drop(bob);

    let left = next_json(&mut alice).await;
    assert_eq!(left["__memberLeft"]["channel"], "presence-lobby");
}

#[tokio::test]
async fn hidden_subscriber_is_excluded_from_the_subscribers_list_and_emits_no_join() {
    let harness = spawn_server().await;

    let token1 = mint_token(&harness, "presence-.*").await;
    let mut alice = authed_connection(&harness, &token1).await;
    alice
        .send(Message::Text(
            json!({"subscribe":{"channel":"presence-lobby","hidden":true,"data":{"name":"alice"}}})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
    let _ = next_json(&mut alice).await;

    let token2 = mint_token(&harness, "presence-.*").await;
    let mut bob = authed_connection(&harness, &token2).await;
    bob.send(Message::Text(
        json!({"subscribe":{"channel":"presence-lobby","data":{"name":"bob"}}})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let bob_reply = next_json(&mut bob).await;
    assert_eq!(
        bob_reply,
        json!({"__subscribed":{"channel":"presence-lobby","subscribers":[]}})
    );
}
