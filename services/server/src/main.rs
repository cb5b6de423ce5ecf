use std::env;
use std::sync::Arc;

use server::config::{self, ServerConfig};
use server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webrocket_core::Context;
use webrocket_storage::SledStorage;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let cfg: ServerConfig = match env::var("WEBROCKET_CONFIG") {
        Ok(path) => config::load_config_from_path(std::path::Path::new(&path)).expect("failed to load config"),
        Err(_) => config::load_config().expect("failed to load config"),
    };

    let storage: Arc<dyn webrocket_core::Storage> =
        Arc::new(SledStorage::open(&cfg.storage_dir).expect("failed to open storage"));
    let context = Arc::new(Context::bootstrap(storage).expect("failed to bootstrap context"));
    info!(cookie = %context.admin_cookie(), "admin cookie (see X-Admin-Cookie)");

    let state = AppState::with_config(
        context,
        cfg.lobby_retry_delay(),
        cfg.lobby_max_retries,
        cfg.heartbeat_interval(),
        cfg.liveness_timeout(),
    );

    let backend_state = state.clone();
    let backend_bind = cfg.backend_bind.clone();
    tokio::spawn(async move {
        if let Err(err) = server::backend_endpoint::run(backend_state, &backend_bind).await {
            tracing::error!(%err, "backend endpoint exited");
        }
    });

    let admin_router = server::build_admin_router(state.clone());
    let admin_listener = tokio::net::TcpListener::bind(&cfg.admin_bind)
        .await
        .expect("failed to bind admin listener");
    info!(addr = %cfg.admin_bind, "admin endpoint listening");
    tokio::spawn(async move {
        axum::serve(admin_listener, admin_router)
            .await
            .expect("admin server error");
    });

    let frontend_router = server::build_frontend_router(state);
    let frontend_listener = tokio::net::TcpListener::bind(&cfg.frontend_bind)
        .await
        .expect("failed to bind frontend listener");
    info!(addr = %cfg.frontend_bind, "frontend endpoint listening");
    axum::serve(frontend_listener, frontend_router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("frontend server error");
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
