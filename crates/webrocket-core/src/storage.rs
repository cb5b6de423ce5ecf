//! The persistence seam (spec §4.E). `webrocket-core` only defines the
//! contract; the sled-backed implementation lives in `webrocket-storage` so
//! this crate stays free of a concrete database dependency.

use crate::channel::ChannelKind;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One vhost record as rebuilt from the KV store at startup.
#[derive(Debug, Clone)]
pub struct LoadedVhost {
    pub path: String,
    pub access_token: String,
    pub channels: Vec<(String, ChannelKind)>,
}

/// The full on-disk state, as read in a single pass at process start
/// (spec §4.E: "Load-on-startup walks `v|*` then, per vhost, `ch|<path>|*`").
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    pub cookie: Option<String>,
    pub vhosts: Vec<LoadedVhost>,
}

/// A durable, prefix-scannable key/value store. Every admin-affecting write
/// (`AddVhost`, `DeleteVhost`, `AddChannel`, `DeleteChannel`, token
/// regeneration) must be durable before the in-memory model is updated.
pub trait Storage: Send + Sync {
    fn put_vhost(&self, path: &str, access_token: &str) -> Result<(), StorageError>;

    /// Deletes the vhost record and every one of its channel keys as a
    /// single transaction (spec §4.E).
    fn delete_vhost(&self, path: &str) -> Result<(), StorageError>;

    fn put_channel(&self, vhost_path: &str, name: &str, kind: ChannelKind) -> Result<(), StorageError>;

    fn delete_channel(&self, vhost_path: &str, name: &str) -> Result<(), StorageError>;

    fn put_cookie(&self, cookie: &str) -> Result<(), StorageError>;

    /// Rebuild the full in-memory model from disk (called once at startup).
    fn load(&self) -> Result<LoadedState, StorageError>;
}
