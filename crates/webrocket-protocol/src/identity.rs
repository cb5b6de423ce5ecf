//! Backend worker identity parsing (spec §3, §9 redesign flag).
//!
//! The identity line has the form `(dlr|req):<vhost-path>:<40-hex-token>:<uuid>`.
//! The legacy source left this regex unanchored in one call site; here it is
//! always anchored so a crafted suffix cannot smuggle extra identity fields.

use regex::Regex;
use std::sync::LazyLock;

static IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(dlr|req):(/[A-Za-z0-9_\-]+(?:/[A-Za-z0-9_\-]+)*):([0-9a-f]{40}):([0-9a-fA-F-]{36})$")
        .expect("identity regex is valid")
});

/// The two connection roles a backend identity can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `dlr` — a long-lived worker eligible for round-robin dispatch.
    Dealer,
    /// `req` — a one-shot RPC connection, closed after a single reply.
    Request,
}

/// A parsed backend identity line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    pub vhost_path: String,
    pub token: String,
    pub worker_id: String,
}

/// Parse a raw identity line. Returns `None` on any malformed input; a
/// malformed identity is a rejected connection, not a fatal error (spec §7).
pub fn parse(line: &str) -> Option<Identity> {
    let caps = IDENTITY_RE.captures(line)?;
    let role = match &caps[1] {
        "dlr" => Role::Dealer,
        "req" => Role::Request,
        _ => return None,
    };
    Some(Identity {
        role,
        vhost_path: caps[2].to_owned(),
        token: caps[3].to_owned(),
        worker_id: caps[4].to_owned(),
    })
}

/// Render an identity back to wire form (used by tests and the worker
/// client helper).
pub fn render(role: Role, vhost_path: &str, token: &str, worker_id: &str) -> String {
    let role_str = match role {
        Role::Dealer => "dlr",
        Role::Request => "req",
    };
    format!("{role_str}:{vhost_path}:{token}:{worker_id}")
}
