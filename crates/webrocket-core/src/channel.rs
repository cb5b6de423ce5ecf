//! Channels: the subscription set and broadcast fan-out (spec §3, §4.C).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;
use webrocket_protocol::frontend;

use crate::error::CoreError;
use crate::session::Session;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").expect("channel name regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Normal,
    Private,
    Presence,
}

impl ChannelKind {
    /// Kind is inferred purely from the name prefix (spec §3).
    pub fn infer(name: &str) -> Self {
        if name.starts_with("presence-") {
            Self::Presence
        } else if name.starts_with("private-") {
            Self::Private
        } else {
            Self::Normal
        }
    }

    pub fn requires_permission(self) -> bool {
        matches!(self, Self::Private | Self::Presence)
    }

    pub fn is_presence(self) -> bool {
        matches!(self, Self::Presence)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Private => "private",
            Self::Presence => "presence",
        }
    }
}

/// Validate a channel name per §3/§4.D: non-empty, no leading `.` or `-`,
/// and every character in `[A-Za-z0-9_-]`. The anchored regex already
/// implies all three (its required first character rules out both a
/// leading `.` and a leading `-`, and an empty string fails the `+`).
pub fn validate_channel_name(name: &str) -> Result<(), CoreError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidChannelName(name.to_owned()))
    }
}

struct Subscription {
    session: Session,
    hidden: bool,
    metadata: Value,
}

pub struct Channel {
    name: String,
    kind: ChannelKind,
    subscribers: Mutex<HashMap<String, Subscription>>,
    killed: AtomicBool,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = ChannelKind::infer(&name);
        Self {
            name,
            kind,
            subscribers: Mutex::new(HashMap::new()),
            killed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn has_subscriber(&self, session_id: &str) -> bool {
        self.subscribers.lock().unwrap().contains_key(session_id)
    }

    /// Register `session` as a subscriber. Returns the metadata of every
    /// currently non-hidden member (spec §4.C: "the newly-subscribed
    /// session receives `__subscribed` whose `subscribers` field lists all
    /// currently non-hidden members, not counting itself") and, as a side
    /// effect, emits `__memberJoined` to those same members when `hidden`
    /// is false — but only for presence channels; other kinds emit no
    /// membership events at all (spec §4.C).
    pub fn subscribe(&self, session: Session, hidden: bool, metadata: Value) -> Vec<Value> {
        if self.is_killed() {
            return Vec::new();
        }
        let mut subs = self.subscribers.lock().unwrap();
        let existing_non_hidden: Vec<Value> = subs
            .values()
            .filter(|s| !s.hidden)
            .map(|s| s.metadata.clone())
            .collect();
        if !hidden && self.kind == ChannelKind::Presence {
            let joined = frontend::member_joined(&session.id, &self.name, metadata.clone());
            for sub in subs.values() {
                if !sub.hidden && !sub.session.send(joined.clone()) {
                    warn!(channel = %self.name, session = %sub.session.id, "memberJoined send failed");
                }
            }
        }
        subs.insert(
            session.id.clone(),
            Subscription {
                session,
                hidden,
                metadata,
            },
        );
        existing_non_hidden
    }

    /// Remove `session_id`. `metadata` is the caller-supplied leave payload
    /// (spec §4.C: `Unsubscribe(session, metadata, notify)`); when `notify`
    /// is true, the leaving member wasn't hidden, and this is a presence
    /// channel, emits `__memberLeft` to the remaining subscribers. Returns
    /// whether the session was present.
    pub fn unsubscribe(&self, session_id: &str, metadata: Value, notify: bool) -> bool {
        let mut subs = self.subscribers.lock().unwrap();
        let Some(removed) = subs.remove(session_id) else {
            return false;
        };
        if notify && !removed.hidden && self.kind == ChannelKind::Presence {
            let left = frontend::member_left(session_id, &self.name, metadata);
            for sub in subs.values() {
                if !sub.hidden && !sub.session.send(left.clone()) {
                    warn!(channel = %self.name, session = %sub.session.id, "memberLeft send failed");
                }
            }
        }
        true
    }

    /// Fan out `payload` to every current subscriber. A single send
    /// failure is logged and does not abort the rest of the fan-out
    /// (spec §4.C).
    pub fn broadcast(&self, payload: Value) {
        if self.is_killed() {
            return;
        }
        let subs = self.subscribers.lock().unwrap();
        for sub in subs.values() {
            if !sub.session.send(payload.clone()) {
                warn!(channel = %self.name, session = %sub.session.id, "broadcast send failed");
            }
        }
    }

    /// Subsequent subscribe/broadcast calls become no-ops; sends already in
    /// flight may still complete (spec §4.C).
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }
}
