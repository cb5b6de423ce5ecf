//! The WebSocket frontend protocol (spec §4.G, §6).
//!
//! Every client frame is a JSON object with exactly one top-level key; the
//! key names the event, the value is that event's data object. Any
//! deviation from that envelope shape is a bad request (§4.G) — this module
//! draws the line between "malformed envelope" (`FrameError`) and
//! "well-formed envelope naming an unknown/incomplete event" (left to the
//! caller, which has the status-code table).

use serde_json::{Map, Value};

/// Reserved server->client event names (the `__`-prefixed frames).
pub mod event_names {
    pub const CONNECTED: &str = "__connected";
    pub const AUTHENTICATED: &str = "__authenticated";
    pub const SUBSCRIBED: &str = "__subscribed";
    pub const UNSUBSCRIBED: &str = "__unsubscribed";
    pub const ERROR: &str = "__error";
    pub const CLOSED: &str = "__closed";
    pub const MEMBER_JOINED: &str = "__memberJoined";
    pub const MEMBER_LEFT: &str = "__memberLeft";
}

/// Why a raw text frame could not even be decomposed into (event, data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    NotJson,
    NotAnObject,
    NoKeys,
    MultipleKeys,
    ValueNotAnObject,
}

/// A parsed client frame, keyed by the event name it arrived under.
///
/// Fields are deliberately `Option`/loosely-typed where the spec marks them
/// required: the envelope parsed cleanly, but the caller (the session
/// handler, which owns the status-code table) decides whether a missing
/// field is a 400.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Auth {
        token: Option<String>,
    },
    Subscribe {
        channel: Option<String>,
        hidden: bool,
        data: Value,
    },
    Unsubscribe {
        channel: Option<String>,
        data: Value,
    },
    Broadcast {
        channel: Option<String>,
        event: Option<String>,
        data: Value,
        trigger: Option<String>,
    },
    Trigger {
        event: Option<String>,
        data: Value,
    },
    Close,
    /// Well-formed envelope, but the event name isn't one we dispatch.
    Unknown(String),
}

fn as_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn as_bool(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn data_field(obj: &Map<String, Value>) -> Value {
    obj.get("data").cloned().unwrap_or(Value::Object(Map::new()))
}

/// Parse one raw WebSocket text frame into a `ClientFrame`.
pub fn parse_client_frame(text: &str) -> Result<ClientFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|_| FrameError::NotJson)?;
    let obj = value.as_object().ok_or(FrameError::NotAnObject)?;
    if obj.is_empty() {
        return Err(FrameError::NoKeys);
    }
    if obj.len() > 1 {
        return Err(FrameError::MultipleKeys);
    }
    let (event, data) = obj.iter().next().expect("len checked above");
    let data_obj = data.as_object().ok_or(FrameError::ValueNotAnObject)?;

    Ok(match event.as_str() {
        "auth" => ClientFrame::Auth {
            token: as_str(data_obj, "token"),
        },
        "subscribe" => ClientFrame::Subscribe {
            channel: as_str(data_obj, "channel"),
            hidden: as_bool(data_obj, "hidden"),
            data: data_field(data_obj),
        },
        "unsubscribe" => ClientFrame::Unsubscribe {
            channel: as_str(data_obj, "channel"),
            data: data_field(data_obj),
        },
        "broadcast" => ClientFrame::Broadcast {
            channel: as_str(data_obj, "channel"),
            event: as_str(data_obj, "event"),
            data: data_field(data_obj),
            trigger: as_str(data_obj, "trigger"),
        },
        "trigger" => ClientFrame::Trigger {
            event: as_str(data_obj, "event"),
            data: data_field(data_obj),
        },
        "close" => ClientFrame::Close,
        other => ClientFrame::Unknown(other.to_owned()),
    })
}

/// Build a single-key server->client frame, e.g. `{"__connected":{"sid":"..."}}`.
pub fn envelope(event: &str, data: Value) -> Value {
    let mut map = Map::new();
    map.insert(event.to_owned(), data);
    Value::Object(map)
}

pub fn connected(sid: &str) -> Value {
    envelope(event_names::CONNECTED, serde_json::json!({ "sid": sid }))
}

pub fn authenticated() -> Value {
    envelope(event_names::AUTHENTICATED, Value::Object(Map::new()))
}

pub fn subscribed(channel: &str, subscribers: Option<Value>) -> Value {
    let mut body = Map::new();
    body.insert("channel".to_owned(), Value::String(channel.to_owned()));
    if let Some(subs) = subscribers {
        body.insert("subscribers".to_owned(), subs);
    }
    envelope(event_names::SUBSCRIBED, Value::Object(body))
}

pub fn unsubscribed(channel: &str) -> Value {
    envelope(
        event_names::UNSUBSCRIBED,
        serde_json::json!({ "channel": channel }),
    )
}

pub fn error_frame(code: u16, status: &str) -> Value {
    envelope(
        event_names::ERROR,
        serde_json::json!({ "code": code, "status": status }),
    )
}

pub fn closed(sid: &str) -> Value {
    envelope(event_names::CLOSED, serde_json::json!({ "sid": sid }))
}

pub fn member_joined(sid: &str, channel: &str, member_data: Value) -> Value {
    let mut body = match member_data {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("data".to_owned(), other);
            m
        }
    };
    body.insert("sid".to_owned(), Value::String(sid.to_owned()));
    body.insert("channel".to_owned(), Value::String(channel.to_owned()));
    envelope(event_names::MEMBER_JOINED, Value::Object(body))
}

pub fn member_left(sid: &str, channel: &str, member_data: Value) -> Value {
    let mut body = match member_data {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("data".to_owned(), other);
            m
        }
    };
    body.insert("sid".to_owned(), Value::String(sid.to_owned()));
    body.insert("channel".to_owned(), Value::String(channel.to_owned()));
    envelope(event_names::MEMBER_LEFT, Value::Object(body))
}

/// Enrich a broadcaster's data payload with `sid` and `channel` before
/// fan-out (spec §4.G: "Broadcast enriches `data` with `sid`...and `channel`").
pub fn enrich_broadcast_data(mut data: Value, sid: &str, channel: &str) -> Value {
    let obj = match &mut data {
        Value::Object(m) => m,
        _ => {
            let mut m = Map::new();
            m.insert("data".to_owned(), data.clone());
            data = Value::Object(m);
            data.as_object_mut().expect("just constructed as object")
        }
    };
    obj.insert("sid".to_owned(), Value::String(sid.to_owned()));
    obj.insert("channel".to_owned(), Value::String(channel.to_owned()));
    data
}
