//! The admin HTTP surface (`SPEC_FULL.md` §"Admin HTTP surface").
//!
//! Vhost paths are arbitrary-depth (`/a/b/c`), so — the same way
//! `ws_frontend` reads the raw request `Uri` instead of a single dynamic
//! segment — every route here is mounted under a wildcard and the handler
//! peels off the trailing operation suffix itself rather than relying on
//! axum's single-segment `:param` matching.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use webrocket_protocol::http::{
    ChannelSummary, CreateChannelRequest, CreateVhostRequest, RegenerateTokenResponse, VhostDetail,
    VhostSummary, WorkerSummary,
};

use super::response::{bad_request, core_error, not_found, unauthorized, HttpResult};
use crate::state::AppState;

fn check_cookie(state: &AppState, headers: &HeaderMap) -> HttpResult<()> {
    let candidate = headers
        .get("x-admin-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.context.check_admin_cookie(candidate) {
        Ok(())
    } else {
        Err(unauthorized("missing or invalid X-Admin-Cookie header"))
    }
}

fn vhost_summary(state: &AppState, vhost: &webrocket_core::Vhost) -> VhostSummary {
    let worker_count = state
        .lobbies
        .lobby(vhost.path())
        .map(|lobby| lobby.worker_ids().len())
        .unwrap_or(0);
    VhostSummary {
        path: vhost.path().to_owned(),
        channel_count: vhost.channels().len(),
        worker_count,
    }
}

pub async fn list_vhosts(State(state): State<AppState>, headers: HeaderMap) -> HttpResult<impl IntoResponse> {
    check_cookie(&state, &headers)?;
    let summaries: Vec<VhostSummary> = state.context.vhosts().iter().map(|v| vhost_summary(&state, v)).collect();
    Ok(Json(summaries))
}

pub async fn create_vhost(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateVhostRequest>,
) -> HttpResult<impl IntoResponse> {
    check_cookie(&state, &headers)?;
    let vhost = state.context.add_vhost(&req.path).map_err(core_error)?;
    Ok((StatusCode::CREATED, Json(vhost_detail(&vhost))))
}

pub async fn clear_vhosts(State(state): State<AppState>, headers: HeaderMap) -> HttpResult<impl IntoResponse> {
    check_cookie(&state, &headers)?;
    state.context.clear_vhosts().map_err(core_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn vhost_detail(vhost: &webrocket_core::Vhost) -> VhostDetail {
    VhostDetail {
        path: vhost.path().to_owned(),
        access_token: vhost.access_token(),
        channels: vhost.channels().iter().map(|c| c.name().to_owned()).collect(),
    }
}

fn channel_summary(channel: &webrocket_core::Channel) -> ChannelSummary {
    ChannelSummary {
        name: channel.name().to_owned(),
        kind: channel.kind().as_str().to_owned(),
        subscriber_count: channel.subscriber_count(),
    }
}

fn full_path(rest: &str) -> String {
    format!("/{}", rest.trim_start_matches('/'))
}

/// `GET /vhosts/*rest`: dispatches to the vhost detail, its channel list, or
/// its worker list depending on the trailing suffix.
pub async fn vhost_scoped_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> HttpResult<Response> {
    check_cookie(&state, &headers)?;

    if let Some(prefix) = rest.strip_suffix("/workers") {
        let path = full_path(prefix);
        if state.context.vhost(&path).is_none() {
            return Err(not_found(format!("vhost {path} not found")));
        }
        let workers: Vec<WorkerSummary> = state
            .lobbies
            .lobby(&path)
            .map(|lobby| {
                lobby
                    .worker_ids()
                    .into_iter()
                    .map(|worker_id| WorkerSummary {
                        worker_id,
                        connected_at_unix: 0,
                        pending_jobs: 0,
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Ok(Json(workers).into_response());
    }

    if let Some(prefix) = rest.strip_suffix("/channels") {
        let path = full_path(prefix);
        let Some(vhost) = state.context.vhost(&path) else {
            return Err(not_found(format!("vhost {path} not found")));
        };
        let channels: Vec<ChannelSummary> = vhost.channels().iter().map(|c| channel_summary(c)).collect();
        return Ok(Json(channels).into_response());
    }

    let path = full_path(&rest);
    let Some(vhost) = state.context.vhost(&path) else {
        return Err(not_found(format!("vhost {path} not found")));
    };
    Ok(Json(vhost_detail(&vhost)).into_response())
}

/// `POST /vhosts/*rest`: token regeneration or channel creation.
pub async fn vhost_scoped_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rest): Path<String>,
    body: axum::body::Bytes,
) -> HttpResult<Response> {
    check_cookie(&state, &headers)?;

    if let Some(prefix) = rest.strip_suffix("/token/regenerate") {
        let path = full_path(prefix);
        let Some(vhost) = state.context.vhost(&path) else {
            return Err(not_found(format!("vhost {path} not found")));
        };
        let access_token = vhost.generate_access_token().map_err(core_error)?;
        return Ok(Json(RegenerateTokenResponse { path, access_token }).into_response());
    }

    if let Some(prefix) = rest.strip_suffix("/channels") {
        let path = full_path(prefix);
        let Some(vhost) = state.context.vhost(&path) else {
            return Err(not_found(format!("vhost {path} not found")));
        };
        let req: CreateChannelRequest =
            serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {e}")))?;
        let channel = vhost.open_channel(&req.name).map_err(core_error)?;
        return Ok((StatusCode::CREATED, Json(channel_summary(&channel))).into_response());
    }

    Err(bad_request("unrecognized admin operation"))
}

/// `DELETE /vhosts/*rest`: the vhost itself, its whole channel set, or one
/// named channel (`.../channels/:name`).
pub async fn vhost_scoped_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rest): Path<String>,
) -> HttpResult<Response> {
    check_cookie(&state, &headers)?;

    if let Some(prefix) = rest.strip_suffix("/channels") {
        let path = full_path(prefix);
        let Some(vhost) = state.context.vhost(&path) else {
            return Err(not_found(format!("vhost {path} not found")));
        };
        for channel in vhost.channels() {
            let _ = vhost.delete_channel(channel.name());
        }
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    if let Some((prefix, name)) = rest.split_once("/channels/") {
        let path = full_path(prefix);
        let Some(vhost) = state.context.vhost(&path) else {
            return Err(not_found(format!("vhost {path} not found")));
        };
        vhost.delete_channel(name).map_err(core_error)?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let path = full_path(&rest);
    state.context.delete_vhost(&path).map_err(core_error)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
