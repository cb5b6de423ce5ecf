pub mod backend_conn;
pub mod backend_endpoint;
pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod ws_frontend;

pub use state::AppState;

use axum::routing::get;
use axum::Router;

/// The frontend WebSocket surface: any path that isn't `/healthz`/`/readyz`
/// is a vhost upgrade attempt, handled by the fallback the same way
/// `ws_frontend::upgrade` reads the raw request `Uri` as the vhost path.
pub fn build_frontend_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .fallback(ws_frontend::upgrade)
        .with_state(state)
}

/// The admin HTTP surface (spec "Admin HTTP surface"), bound separately so
/// it can sit behind a different network boundary than the public frontend.
pub fn build_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route(
            "/vhosts",
            get(http::admin::list_vhosts)
                .post(http::admin::create_vhost)
                .delete(http::admin::clear_vhosts),
        )
        .route(
            "/vhosts/*rest",
            get(http::admin::vhost_scoped_get)
                .post(http::admin::vhost_scoped_post)
                .delete(http::admin::vhost_scoped_delete),
        )
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
