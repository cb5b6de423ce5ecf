use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webrocket_core::{Context, EndpointRegistry, Lobby, Vhost, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Heartbeat/liveness defaults per §4.I, overridable via config (spec
/// "Configuration").
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(6);

/// Keeps one `Lobby` per live vhost and spawns/retires its dispatcher task
/// as vhosts come and go (spec §4.F: "each endpoint's derived
/// registration").
pub struct LobbyRegistry {
    lobbies: Mutex<HashMap<String, Arc<Lobby>>>,
    retry_delay: Duration,
    max_retries: u32,
}

impl LobbyRegistry {
    pub fn new(retry_delay: Duration, max_retries: u32) -> Arc<Self> {
        Arc::new(Self {
            lobbies: Mutex::new(HashMap::new()),
            retry_delay,
            max_retries,
        })
    }

    pub fn lobby(&self, vhost_path: &str) -> Option<Arc<Lobby>> {
        self.lobbies.lock().unwrap().get(vhost_path).cloned()
    }

    fn spawn_for(&self, path: &str) {
        let (lobby, queue_rx) = Lobby::new(self.retry_delay, self.max_retries);
        self.lobbies.lock().unwrap().insert(path.to_owned(), lobby.clone());
        tokio::spawn(lobby.run_dispatcher(queue_rx));
    }
}

impl EndpointRegistry for LobbyRegistry {
    fn on_vhost_added(&self, vhost: &Arc<Vhost>) {
        self.spawn_for(vhost.path());
    }

    /// Dropping the map entry drops the `Lobby`'s queue sender, which ends
    /// `run_dispatcher`'s receive loop — no explicit task handle needed.
    fn on_vhost_removed(&self, path: &str) {
        self.lobbies.lock().unwrap().remove(path);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<Context>,
    pub lobbies: Arc<LobbyRegistry>,
    pub heartbeat_interval: Duration,
    pub liveness_timeout: Duration,
}

impl AppState {
    /// Wires the lobby registry into the context and primes a dispatcher
    /// for every vhost restored from storage (restoration builds the vhost
    /// map directly, bypassing `add_vhost`, so it never fires
    /// `on_vhost_added`), using every default from the "Configuration"
    /// ambient spec. Use `with_config` to override them.
    pub fn new(context: Arc<Context>) -> Self {
        Self::with_config(
            context,
            DEFAULT_RETRY_DELAY,
            DEFAULT_MAX_RETRIES,
            DEFAULT_HEARTBEAT_INTERVAL,
            DEFAULT_LIVENESS_TIMEOUT,
        )
    }

    pub fn with_config(
        context: Arc<Context>,
        lobby_retry_delay: Duration,
        lobby_max_retries: u32,
        heartbeat_interval: Duration,
        liveness_timeout: Duration,
    ) -> Self {
        let lobbies = LobbyRegistry::new(lobby_retry_delay, lobby_max_retries);
        context.register_endpoint(lobbies.clone());
        for vhost in context.vhosts() {
            lobbies.spawn_for(vhost.path());
        }
        Self {
            context,
            lobbies,
            heartbeat_interval,
            liveness_timeout,
        }
    }
}
