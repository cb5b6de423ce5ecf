//! The backend TCP accept loop (spec §4.J): one task per connection,
//! handed straight to `backend_conn::handle_connection`.

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::backend_conn;
use crate::state::AppState;

pub async fn run(state: AppState, bind_addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "backend endpoint listening");
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "backend accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = backend_conn::handle_connection(socket, state).await {
                warn!(%peer, %err, "backend connection ended with an io error");
            }
        });
    }
}
