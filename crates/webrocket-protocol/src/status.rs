//! Frozen status/error codes used on both the WebSocket frontend (`__error`)
//! and the backend TCP wire (`ER`/`OK` frames). See spec §6.

/// Status codes sent in `__error{code,status}` frames and backend `ER` frames.
pub mod error_codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 402;
    pub const FORBIDDEN: u16 = 403;
    pub const INVALID_CHANNEL_NAME: u16 = 451;
    pub const INVALID_EVENT_NAME: u16 = 452;
    pub const NOT_SUBSCRIBED: u16 = 453;
    pub const CHANNEL_NOT_FOUND: u16 = 454;
    pub const INTERNAL: u16 = 500;
    pub const CANNOT_SEND: u16 = 597;
    pub const END_OF_FILE: u16 = 598;
}

/// Success codes carried in backend `OK` frames (201..270 band).
pub mod ok_codes {
    pub const AUTHENTICATED: u16 = 201;
    pub const SUBSCRIBED: u16 = 202;
    pub const UNSUBSCRIBED: u16 = 203;
    pub const CHANNEL_OPENED: u16 = 204;
    pub const CHANNEL_CLOSED: u16 = 205;
    pub const BROADCAST_SENT: u16 = 206;
    pub const SINGLE_ACCESS_TOKEN_GENERATED: u16 = 270;
}

/// Backend informational codes (not errors, not acks).
pub mod info_codes {
    pub const READY: u16 = 300;
    pub const HEARTBEAT: u16 = 301;
    pub const CONNECTED: u16 = 305;
    pub const EXPIRED: u16 = 408;
}

/// Human-readable status text matching the code, used in `__error.status`
/// and logging. Mirrors the small fixed vocabulary exercised by the
/// end-to-end scenarios in spec §8 (e.g. `"Bad request"`, `"Unauthorized"`).
pub fn status_text(code: u16) -> &'static str {
    use error_codes::*;
    match code {
        BAD_REQUEST => "Bad request",
        UNAUTHORIZED => "Unauthorized",
        FORBIDDEN => "Forbidden",
        INVALID_CHANNEL_NAME => "Invalid channel name",
        INVALID_EVENT_NAME => "Invalid event name",
        NOT_SUBSCRIBED => "Not subscribed",
        CHANNEL_NOT_FOUND => "Channel not found",
        INTERNAL => "Internal error",
        CANNOT_SEND => "Cannot send",
        END_OF_FILE => "End of file",
        ok_codes::AUTHENTICATED => "Authenticated",
        ok_codes::SUBSCRIBED => "Subscribed",
        ok_codes::UNSUBSCRIBED => "Unsubscribed",
        ok_codes::CHANNEL_OPENED => "Channel opened",
        ok_codes::CHANNEL_CLOSED => "Channel closed",
        ok_codes::BROADCAST_SENT => "Broadcast sent",
        ok_codes::SINGLE_ACCESS_TOKEN_GENERATED => "Single access token generated",
        info_codes::READY => "Ready",
        info_codes::HEARTBEAT => "Heartbeat",
        info_codes::CONNECTED => "Connected",
        info_codes::EXPIRED => "Expired",
        _ => "Unknown",
    }
}
