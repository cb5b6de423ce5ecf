//! webrocket-core: the in-process routing and session fabric — vhosts,
//! channels, permissions, the admin registry, and the backend dispatch
//! lobby. Nothing here touches a socket; `server` drives all of it from
//! async connection tasks.

pub mod channel;
pub mod context;
pub mod error;
pub mod lobby;
pub mod permission;
pub mod session;
pub mod storage;
pub mod vhost;

pub use channel::{Channel, ChannelKind};
pub use context::{Context, EndpointRegistry};
pub use error::CoreError;
pub use lobby::{Lobby, WorkerSink, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use permission::Permission;
pub use session::Session;
pub use storage::{LoadedState, LoadedVhost, Storage, StorageError};
pub use vhost::Vhost;
