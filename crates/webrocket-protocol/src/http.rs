//! DTOs for the admin HTTP surface (`SPEC_FULL.md` §"Admin HTTP surface").
//!
//! The response building (status codes, the `HttpErrorEnvelope` wrapper) is
//! the `server` crate's job; this module only defines the JSON shapes both
//! `server` and `admin-cli` agree on.

use serde::{Deserialize, Serialize};

/// The envelope every non-2xx admin response body uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VhostSummary {
    pub path: String,
    pub channel_count: usize,
    pub worker_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VhostDetail {
    pub path: String,
    pub access_token: String,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVhostRequest {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerateTokenResponse {
    pub path: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub name: String,
    pub kind: String,
    pub subscriber_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub connected_at_unix: i64,
    pub pending_jobs: usize,
}
