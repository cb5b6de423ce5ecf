//! The frontend WebSocket protocol state machine (spec §4.G): one task per
//! connection, dispatching the single-top-level-key JSON envelope against
//! the vhost named by the request path.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use webrocket_core::{Permission, Session, Vhost};
use webrocket_protocol::frontend::{self, ClientFrame};
use webrocket_protocol::status::{error_codes, status_text};

use crate::state::AppState;

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade, uri: Uri) -> Response {
    let vhost_path = uri.path().to_owned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, vhost_path))
}

async fn handle_socket(socket: WebSocket, state: AppState, vhost_path: String) {
    let Some(vhost) = state.context.vhost(&vhost_path) else {
        debug!(vhost = %vhost_path, "websocket connect to unknown vhost");
        return;
    };

    let sid = Uuid::new_v4().to_string();
    let (session, mut outbox) = Session::new(sid.clone());
    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    session.send(frontend::connected(&sid));

    let mut permission: Option<Permission> = None;
    let mut joined: HashSet<String> = HashSet::new();

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match frontend::parse_client_frame(&text) {
            Err(_) => {
                send_error(&session, error_codes::BAD_REQUEST);
            }
            Ok(ClientFrame::Auth { token }) => {
                handle_auth(&vhost, &session, &mut permission, &mut joined, token);
            }
            Ok(ClientFrame::Subscribe { channel, hidden, data }) => {
                handle_subscribe(&vhost, &session, &sid, &permission, &mut joined, channel, hidden, data);
            }
            Ok(ClientFrame::Unsubscribe { channel, data }) => {
                handle_unsubscribe(&vhost, &session, &sid, &mut joined, channel, data);
            }
            Ok(ClientFrame::Broadcast {
                channel,
                event,
                data,
                trigger,
            }) => {
                handle_broadcast(&vhost, &state, &session, &sid, &permission, channel, event, data, trigger);
            }
            Ok(ClientFrame::Trigger { event, data }) => {
                handle_trigger(&vhost, &state, &session, &permission, &sid, event, data);
            }
            Ok(ClientFrame::Close) => {
                session.send(frontend::closed(&sid));
                break;
            }
            Ok(ClientFrame::Unknown(name)) => {
                warn!(event = %name, "unknown frontend event");
                send_error(&session, error_codes::BAD_REQUEST);
            }
        }
    }

    for channel_name in &joined {
        if let Some(channel) = vhost.channel(channel_name) {
            channel.unsubscribe(&sid, Value::Object(Default::default()), true);
        }
    }
    drop(session);
    let _ = send_task.await;
}

fn send_error(session: &Session, code: u16) {
    session.send(frontend::error_frame(code, status_text(code)));
}

fn handle_auth(
    vhost: &Vhost,
    session: &Session,
    permission: &mut Option<Permission>,
    joined: &mut HashSet<String>,
    token: Option<String>,
) {
    let Some(token) = token else {
        send_error(session, error_codes::BAD_REQUEST);
        return;
    };
    let Some(new_permission) = vhost.validate_single_access_token(&token) else {
        send_error(session, error_codes::UNAUTHORIZED);
        return;
    };

    // Re-auth clears subscriptions, then retries (spec §4.G).
    for name in joined.drain() {
        if let Some(channel) = vhost.channel(&name) {
            channel.unsubscribe(&session.id, Value::Object(Default::default()), true);
        }
    }
    *permission = Some(new_permission);
    session.send(frontend::authenticated());
}

#[allow(clippy::too_many_arguments)]
fn handle_subscribe(
    vhost: &Vhost,
    session: &Session,
    sid: &str,
    permission: &Option<Permission>,
    joined: &mut HashSet<String>,
    channel_name: Option<String>,
    hidden: bool,
    data: Value,
) {
    let Some(channel_name) = channel_name else {
        send_error(session, error_codes::BAD_REQUEST);
        return;
    };
    let Some(channel) = vhost.channel(&channel_name) else {
        send_error(session, error_codes::CHANNEL_NOT_FOUND);
        return;
    };
    if channel.kind().requires_permission()
        && !permission.as_ref().is_some_and(|p| p.matches(&channel_name))
    {
        send_error(session, error_codes::FORBIDDEN);
        return;
    }

    let existing = channel.subscribe(session.clone(), hidden, data);
    joined.insert(channel_name.clone());
    let subscribers = channel.kind().is_presence().then(|| Value::Array(existing));
    session.send(frontend::subscribed(&channel_name, subscribers));
}

fn handle_unsubscribe(
    vhost: &Vhost,
    session: &Session,
    sid: &str,
    joined: &mut HashSet<String>,
    channel_name: Option<String>,
    data: Value,
) {
    let Some(channel_name) = channel_name else {
        send_error(session, error_codes::BAD_REQUEST);
        return;
    };
    let Some(channel) = vhost.channel(&channel_name) else {
        send_error(session, error_codes::CHANNEL_NOT_FOUND);
        return;
    };
    if !channel.unsubscribe(sid, data, true) {
        send_error(session, error_codes::NOT_SUBSCRIBED);
        return;
    }
    joined.remove(&channel_name);
    session.send(frontend::unsubscribed(&channel_name));
}

#[allow(clippy::too_many_arguments)]
fn handle_broadcast(
    vhost: &Vhost,
    state: &AppState,
    session: &Session,
    sid: &str,
    permission: &Option<Permission>,
    channel_name: Option<String>,
    event: Option<String>,
    data: Value,
    trigger: Option<String>,
) {
    let (Some(channel_name), Some(event)) = (channel_name, event) else {
        send_error(session, error_codes::BAD_REQUEST);
        return;
    };
    let Some(channel) = vhost.channel(&channel_name) else {
        send_error(session, error_codes::CHANNEL_NOT_FOUND);
        return;
    };
    if !channel.has_subscriber(sid) {
        send_error(session, error_codes::NOT_SUBSCRIBED);
        return;
    }
    if trigger.is_some() && permission.is_none() {
        send_error(session, error_codes::FORBIDDEN);
        return;
    }

    let enriched = frontend::enrich_broadcast_data(data, sid, &channel_name);
    channel.broadcast(frontend::envelope(&event, enriched.clone()));

    if let Some(trigger_key) = trigger {
        if let Some(lobby) = state.lobbies.lobby(vhost.path()) {
            lobby.trigger(serde_json::json!({ trigger_key: enriched }));
        }
    }
}

fn handle_trigger(
    vhost: &Vhost,
    state: &AppState,
    session: &Session,
    permission: &Option<Permission>,
    sid: &str,
    event: Option<String>,
    data: Value,
) {
    let Some(event) = event else {
        send_error(session, error_codes::BAD_REQUEST);
        return;
    };
    if permission.is_none() {
        send_error(session, error_codes::FORBIDDEN);
        return;
    }
    if let Some(lobby) = state.lobbies.lobby(vhost.path()) {
        lobby.trigger(serde_json::json!({ "event": event, "data": data, "sid": sid }));
    }
}
