//! Vhosts: namespaces owning channels, access tokens, and pending
//! single-access grants (spec §3, §4.D).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::channel::{validate_channel_name, Channel, ChannelKind};
use crate::error::CoreError;
use crate::permission::Permission;
use crate::storage::Storage;

/// 40-hex SHA-1 of 32 random bytes (spec §3: the vhost access token).
pub(crate) fn random_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(Sha1::digest(bytes))
}

pub struct Vhost {
    path: String,
    access_token: Mutex<String>,
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    pending_tokens: Mutex<HashMap<String, Permission>>,
    storage: Arc<dyn Storage>,
}

impl Vhost {
    pub fn new(path: impl Into<String>, access_token: String, storage: Arc<dyn Storage>) -> Self {
        Self {
            path: path.into(),
            access_token: Mutex::new(access_token),
            channels: Mutex::new(HashMap::new()),
            pending_tokens: Mutex::new(HashMap::new()),
            storage,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access_token(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }

    /// Exact string equality against the live token (spec §3: "the
    /// access-token check on a backend identity uses exact string
    /// equality").
    pub fn check_token(&self, candidate: &str) -> bool {
        *self.access_token.lock().unwrap() == candidate
    }

    /// Replace the token atomically: storage write first, then memory
    /// (spec §5: "vhost mutations always apply to storage first, memory
    /// second").
    pub fn generate_access_token(&self) -> Result<String, CoreError> {
        let new_token = random_access_token();
        self.storage.put_vhost(&self.path, &new_token)?;
        *self.access_token.lock().unwrap() = new_token.clone();
        Ok(new_token)
    }

    pub fn generate_single_access_token(&self, pattern: &str) -> Result<String, CoreError> {
        let permission =
            Permission::mint(pattern).map_err(|e| CoreError::InvalidPattern(e.to_string()))?;
        let token = permission.single_access_token.clone();
        self.pending_tokens.lock().unwrap().insert(token.clone(), permission);
        Ok(token)
    }

    /// Consume-once: present and removed together, or absent (spec §4.D).
    pub fn validate_single_access_token(&self, token: &str) -> Option<Permission> {
        self.pending_tokens.lock().unwrap().remove(token)
    }

    pub fn open_channel(&self, name: &str) -> Result<Arc<Channel>, CoreError> {
        validate_channel_name(name)?;
        let mut channels = self.channels.lock().unwrap();
        if channels.contains_key(name) {
            return Err(CoreError::ChannelExists(name.to_owned()));
        }
        let kind = ChannelKind::infer(name);
        self.storage.put_channel(&self.path, name, kind)?;
        let channel = Arc::new(Channel::new(name));
        channels.insert(name.to_owned(), channel.clone());
        Ok(channel)
    }

    /// Fails silently if the channel is absent (spec §4.D).
    pub fn delete_channel(&self, name: &str) -> Result<(), CoreError> {
        let mut channels = self.channels.lock().unwrap();
        let Some(channel) = channels.remove(name) else {
            return Ok(());
        };
        self.storage.delete_channel(&self.path, name)?;
        channel.kill();
        Ok(())
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.lock().unwrap().get(name).cloned()
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.lock().unwrap().values().cloned().collect()
    }

    /// Reinsert a channel rebuilt from storage at startup without
    /// re-persisting it (the record is already on disk).
    pub fn restore_channel(&self, name: &str) {
        let channel = Arc::new(Channel::new(name));
        self.channels.lock().unwrap().insert(name.to_owned(), channel);
    }
}
