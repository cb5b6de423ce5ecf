//! End-to-End: WebSocket frontend protocol against a running server.
//!
//! 1. Server is started in-process, bound to ephemeral ports.
//! 2. A raw TCP `req` connection mints a single-access token for `/test`.
//! 3. A `tokio-tungstenite` client connects and runs the malformed-frame,
//!    auth, subscribe, and re-auth scenarios from spec §8.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use webrocket_core::Context;
use webrocket_storage::SledStorage;

struct Harness {
    frontend_addr: std::net::SocketAddr,
    admin_addr: std::net::SocketAddr,
    backend_addr: std::net::SocketAddr,
    context: Arc<Context>,
    _tmp: tempfile::TempDir,
}

async fn spawn_server() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let storage: Arc<dyn webrocket_core::Storage> = Arc::new(SledStorage::open(tmp.path()).unwrap());
    let context = Arc::new(Context::bootstrap(storage).unwrap());
    context.add_vhost("/test").unwrap();
    let state = server::AppState::new(context.clone());

    let frontend_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let frontend_addr = frontend_listener.local_addr().unwrap();
    let frontend_router = server::build_frontend_router(state.clone());
    tokio::spawn(async move {
        axum::serve(frontend_listener, frontend_router).await.unwrap();
    });

    let admin_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let admin_router = server::build_admin_router(state.clone());
    tokio::spawn(async move {
        axum::serve(admin_listener, admin_router).await.unwrap();
    });

    let backend_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend_listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = backend_listener.accept().await else {
                break;
            };
            let state = state.clone();
            tokio::spawn(server::backend_conn::handle_connection(stream, state));
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Harness {
        frontend_addr,
        admin_addr,
        backend_addr,
        context,
        _tmp: tmp,
    }
}

/// Opens a one-shot `req` connection, sends one command, and returns its
/// reply split into lines (`["OK", "", "<frame-0>", ...]`).
async fn req_command(backend_addr: std::net::SocketAddr, token: &str, command: &str, frames: &[&str]) -> Vec<String> {
    let mut stream = TcpStream::connect(backend_addr).await.unwrap();
    let identity = format!("req:/test:{token}:550e8400-e29b-41d4-a716-446655440000");
    let body = format!("{command}\n{}", frames.join("\n"));
    let message = format!("{identity}\n\n{body}\n\r\n\r\n");
    stream.write_all(message.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8(buf).unwrap();
    let body = text.trim_end_matches("\r\n\r\n");
    body.split('\n').map(str::to_owned).collect()
}

async fn next_json(ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin)) -> Value {
    let msg = ws.next().await.unwrap().unwrap();
    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_frame_receives_a_bad_request_error() {
    let harness = spawn_server().await;
    let url = format!("ws://{}/test", harness.frontend_addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let _connected = next_json(&mut ws).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"__error":{"code":400,"status":"Bad request"}}));
}

#[tokio::test]
async fn mint_and_redeem_single_access_token_then_reject_reuse() {
    let harness = spawn_server().await;
    let access_token = harness.context.vhost("/test").unwrap().access_token();

    let reply = req_command(harness.backend_addr, &access_token, "AT", &[".*"]).await;
    assert_eq!(reply[0], "OK");
    let token = reply[2].clone();

    let url = format!("ws://{}/test", harness.frontend_addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let _connected = next_json(&mut ws).await;
    ws.send(Message::Text(json!({"auth":{"token":token}}).to_string().into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"__authenticated":{}}));

    // Reuse from a fresh session is rejected (consume-once).
    let (mut ws2, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let _connected2 = next_json(&mut ws2).await;
    ws2.send(Message::Text(json!({"auth":{"token":token}}).to_string().into()))
        .await
        .unwrap();
    let reply2 = next_json(&mut ws2).await;
    assert_eq!(reply2, json!({"__error":{"code":402,"status":"Unauthorized"}}));
}

#[tokio::test]
async fn subscribe_to_unknown_channel_is_rejected_and_known_channel_succeeds() {
    let harness = spawn_server().await;
    harness.context.vhost("/test").unwrap().open_channel("general").unwrap();

    let url = format!("ws://{}/test", harness.frontend_addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let _connected = next_json(&mut ws).await;

    ws.send(Message::Text(json!({"subscribe":{"channel":"missing"}}).to_string().into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"__error":{"code":454,"status":"Channel not found"}}));

    ws.send(Message::Text(json!({"subscribe":{"channel":"general"}}).to_string().into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"__subscribed":{"channel":"general"}}));

    // Admin surface sees the subscriber as soon as the channel does.
    let client = reqwest::Client::new();
    let summary: Value = client
        .get(format!("http://{}/vhosts/test/channels", harness.admin_addr))
        .header("X-Admin-Cookie", harness.context.admin_cookie())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary[0]["subscriber_count"], 1);
}

/// Normal (and private) channels emit no membership events at all — only
/// `presence-` channels do (spec §4.C). A second, non-hidden subscriber
/// joining an ordinary channel must not produce a `__memberJoined` for the
/// first subscriber, and its leave must not produce a `__memberLeft`.
#[tokio::test]
async fn normal_channel_subscribe_and_unsubscribe_emit_no_membership_events() {
    let harness = spawn_server().await;
    harness.context.vhost("/test").unwrap().open_channel("general").unwrap();

    let url = format!("ws://{}/test", harness.frontend_addr);
    let (mut first, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let _connected1 = next_json(&mut first).await;
    first
        .send(Message::Text(json!({"subscribe":{"channel":"general"}}).to_string().into()))
        .await
        .unwrap();
    let reply1 = next_json(&mut first).await;
    assert_eq!(reply1, json!({"__subscribed":{"channel":"general"}}));

    let (mut second, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let _connected2 = next_json(&mut second).await;
    second
        .send(Message::Text(json!({"subscribe":{"channel":"general"}}).to_string().into()))
        .await
        .unwrap();
    let reply2 = next_json(&mut second).await;
    assert_eq!(reply2, json!({"__subscribed":{"channel":"general"}}));

    second.send(Message::Text(json!({"unsubscribe":{"channel":"general"}}).to_string().into()))
        .await
        .unwrap();
    let unsub_reply = next_json(&mut second).await;
    assert_eq!(unsub_reply, json!({"__unsubscribed":{"channel":"general"}}));

    // Nothing else should ever arrive on `first` — no `__memberJoined` for
    // the second subscriber's join, no `__memberLeft` for its leave.
    let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), first.next()).await;
    assert!(nothing.is_err(), "normal channels must emit no membership events");
}
