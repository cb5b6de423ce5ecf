use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use webrocket_protocol::http::HttpErrorEnvelope;

pub type HttpResponse = Response;
pub type HttpResult<T = ()> = Result<T, HttpResponse>;

pub(crate) fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> HttpResponse {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn not_found(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn unauthorized(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

/// Maps a `CoreError` onto its admin-surface JSON error response.
pub fn core_error(err: webrocket_core::CoreError) -> HttpResponse {
    json_error(
        crate::error::status_for(&err),
        crate::error::code_for(&err),
        err.to_string(),
    )
}
