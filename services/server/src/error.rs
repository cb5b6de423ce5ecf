//! Maps `webrocket_core::CoreError` onto HTTP status codes for the admin
//! surface (spec §7: error handling propagates storage failures to the
//! caller without applying the in-memory change).

use axum::http::StatusCode;
use webrocket_core::CoreError;

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::VhostNotFound(_) | CoreError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::VhostExists(_) | CoreError::ChannelExists(_) => StatusCode::CONFLICT,
        CoreError::InvalidVhostPath(_)
        | CoreError::InvalidChannelName(_)
        | CoreError::InvalidPattern(_) => StatusCode::BAD_REQUEST,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn code_for(err: &CoreError) -> &'static str {
    match err {
        CoreError::VhostNotFound(_) => "VHOST_NOT_FOUND",
        CoreError::ChannelNotFound(_) => "CHANNEL_NOT_FOUND",
        CoreError::VhostExists(_) => "VHOST_EXISTS",
        CoreError::ChannelExists(_) => "CHANNEL_EXISTS",
        CoreError::InvalidVhostPath(_) => "INVALID_VHOST_PATH",
        CoreError::InvalidChannelName(_) => "INVALID_CHANNEL_NAME",
        CoreError::InvalidPattern(_) => "INVALID_PATTERN",
        CoreError::Storage(_) => "STORAGE_ERROR",
    }
}
