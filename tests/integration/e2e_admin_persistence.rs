//! End-to-End: admin HTTP CRUD operations persist across a restart (spec
//! §"Admin HTTP surface", §4.H storage durability).
//!
//! Vhosts and channels created through the admin HTTP surface must survive
//! re-opening the same `sled` directory in a fresh `Context`, the same way
//! `webrocket-storage`'s own round-trip tests check one layer down.

use std::sync::Arc;

use serde_json::{json, Value};
use webrocket_core::Context;
use webrocket_storage::SledStorage;

struct Harness {
    admin_addr: std::net::SocketAddr,
    context: Arc<Context>,
    server_task: tokio::task::JoinHandle<()>,
}

async fn spawn_server(context: Arc<Context>) -> Harness {
    let state = server::AppState::new(context.clone());
    let admin_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let admin_router = server::build_admin_router(state);
    let server_task = tokio::spawn(async move {
        axum::serve(admin_listener, admin_router).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Harness {
        admin_addr,
        context,
        server_task,
    }
}

#[tokio::test]
async fn vhost_and_channel_created_via_admin_http_survive_a_restart() {
    let tmp = tempfile::tempdir().unwrap();

    let storage: Arc<dyn webrocket_core::Storage> = Arc::new(SledStorage::open(tmp.path()).unwrap());
    let context = Arc::new(Context::bootstrap(storage).unwrap());
    let harness = spawn_server(context.clone()).await;
    let cookie = harness.context.admin_cookie();

    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("http://{}/vhosts", harness.admin_addr))
        .header("X-Admin-Cookie", &cookie)
        .json(&json!({"path": "/orders"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["path"], "/orders");
    let access_token = created["access_token"].as_str().unwrap().to_owned();

    let channel_resp = client
        .post(format!("http://{}/vhosts/orders/channels", harness.admin_addr))
        .header("X-Admin-Cookie", &cookie)
        .json(&json!({"name": "updates"}))
        .send()
        .await
        .unwrap();
    assert_eq!(channel_resp.status(), 201);

    // Tear down every handle to the first `Context`/`sled::Db` so the
    // directory is free for a fresh open, the same way a process restart
    // would leave nothing but the on-disk tree behind. The admin router
    // task holds its own `Arc<Context>` clone via `AppState`, so dropping
    // `harness` alone would not release it.
    harness.server_task.abort();
    drop(harness);
    drop(context);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let storage2: Arc<dyn webrocket_core::Storage> = Arc::new(SledStorage::open(tmp.path()).unwrap());
    let context2 = Arc::new(Context::bootstrap(storage2).unwrap());

    assert_eq!(context2.admin_cookie(), cookie, "admin cookie must survive a restart");

    let vhost = context2.vhost("/orders").expect("vhost must be restored from storage");
    assert_eq!(vhost.access_token(), access_token, "access token must be restored from storage");
    assert!(vhost.channel("updates").is_some(), "channel must be restored from storage");
}
