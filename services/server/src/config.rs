//! Server configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides except
//! `LOG_LEVEL` (handled in `main`, not here) and the `BIND_ADDR`-style
//! operational knobs below. Default config path: `/etc/webrocket/server.toml`.

use serde::Deserialize;
use std::path::Path;

use webrocket_core::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

use crate::state::DEFAULT_HEARTBEAT_INTERVAL;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub schema_version: u32,
    pub frontend_bind: String,
    pub backend_bind: String,
    pub admin_bind: String,
    pub storage_dir: String,
    /// Worker heartbeat interval, in milliseconds (spec §4.I, §5).
    pub heartbeat_interval_ms: u64,
    /// Liveness timeout = `heartbeat_interval_ms * liveness_factor` (spec §5:
    /// "a liveness factor of 3").
    pub liveness_factor: u32,
    /// Lobby dispatcher retry delay, in milliseconds (spec §4.I).
    pub lobby_retry_delay_ms: u64,
    pub lobby_max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    frontend_bind: Option<String>,
    backend_bind: Option<String>,
    admin_bind: Option<String>,
    storage_dir: Option<String>,
    heartbeat_interval_ms: Option<u64>,
    liveness_factor: Option<u32>,
    lobby_retry_delay_ms: Option<u64>,
    lobby_max_retries: Option<u32>,
}

pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/webrocket/server.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<ServerConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {schema_version}"
        )));
    }

    Ok(ServerConfig {
        schema_version,
        frontend_bind: env_override("FRONTEND_BIND")
            .or(raw.frontend_bind)
            .unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
        backend_bind: env_override("BACKEND_BIND")
            .or(raw.backend_bind)
            .unwrap_or_else(|| "0.0.0.0:8081".to_owned()),
        admin_bind: env_override("ADMIN_BIND")
            .or(raw.admin_bind)
            .unwrap_or_else(|| "127.0.0.1:8082".to_owned()),
        storage_dir: env_override("STORAGE_DIR")
            .or(raw.storage_dir)
            .unwrap_or_else(|| "/var/lib/webrocket".to_owned()),
        heartbeat_interval_ms: raw
            .heartbeat_interval_ms
            .unwrap_or_else(|| DEFAULT_HEARTBEAT_INTERVAL.as_millis() as u64),
        liveness_factor: raw.liveness_factor.unwrap_or(3),
        lobby_retry_delay_ms: raw
            .lobby_retry_delay_ms
            .unwrap_or_else(|| DEFAULT_RETRY_DELAY.as_millis() as u64),
        lobby_max_retries: raw.lobby_max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
    })
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn liveness_timeout(&self) -> std::time::Duration {
        self.heartbeat_interval() * self.liveness_factor
    }

    pub fn lobby_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lobby_retry_delay_ms)
    }
}

/// Operational knobs (bind addresses, storage dir) may be overridden by
/// environment variable, matching `main.rs`'s `env::var("BIND_ADDR")`
/// pattern for knobs that change per-deployment rather than per-feature.
fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "Parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}
