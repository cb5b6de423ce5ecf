//! A transport-agnostic handle to a frontend WebSocket connection.
//!
//! Channels (and the session itself) only need to hand a session a JSON
//! frame; the `server` crate owns the receiving half and actually writes it
//! to the socket. This keeps fan-out (spec §4.C) from ever blocking on a
//! slow socket write while holding a channel's subscriber lock.

use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct Session {
    pub id: String,
    outbox: mpsc::UnboundedSender<Value>,
}

impl Session {
    /// Create a session handle and the receiver its owning connection task
    /// should drain to drive the actual socket writes.
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        (
            Self {
                id: id.into(),
                outbox,
            },
            inbox,
        )
    }

    /// Queue a frame for delivery. Returns `false` if the connection task
    /// has already dropped its receiver; callers log this but never treat
    /// it as fatal to a broadcast fan-out (spec §4.C).
    pub fn send(&self, frame: Value) -> bool {
        self.outbox.send(frame).is_ok()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Session {}
