//! Core error type (spec §7 "error handling design").

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("vhost not found: {0}")]
    VhostNotFound(String),

    #[error("vhost already exists: {0}")]
    VhostExists(String),

    #[error("invalid vhost path: {0}")]
    InvalidVhostPath(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel already exists: {0}")]
    ChannelExists(String),

    #[error("invalid channel name: {0}")]
    InvalidChannelName(String),

    #[error("invalid permission pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
