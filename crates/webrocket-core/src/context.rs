//! The process-wide registry: vhosts, the admin cookie, and the endpoints
//! that must learn about vhost lifecycle changes (spec §4.F).

use std::sync::{Arc, Mutex};
use std::collections::HashMap;

use rand::RngCore;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::sync::LazyLock;

use crate::error::CoreError;
use crate::storage::Storage;
use crate::vhost::{random_access_token, Vhost};

static VHOST_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[A-Za-z0-9_\-]+(/[A-Za-z0-9_\-]+)*$").expect("vhost path regex is valid"));

fn validate_vhost_path(path: &str) -> Result<(), CoreError> {
    if VHOST_PATH_RE.is_match(path) {
        Ok(())
    } else {
        Err(CoreError::InvalidVhostPath(path.to_owned()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn generate_cookie() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(Sha1::digest(bytes))
}

/// A collaborator that must be told when a vhost is added or removed so it
/// can keep its own derived registration in sync (spec §4.F: "`AddVhost` /
/// `DeleteVhost` are atomic across context map, storage, and each
/// endpoint's derived registration"). Implemented by the frontend and
/// backend endpoints in the `server` crate.
pub trait EndpointRegistry: Send + Sync {
    fn on_vhost_added(&self, vhost: &Arc<Vhost>);
    fn on_vhost_removed(&self, path: &str);
}

pub struct Context {
    vhosts: Mutex<HashMap<String, Arc<Vhost>>>,
    endpoints: Mutex<Vec<Arc<dyn EndpointRegistry>>>,
    storage: Arc<dyn Storage>,
    admin_cookie: String,
}

impl Context {
    /// Load persisted vhosts/channels and the admin cookie, generating and
    /// persisting a fresh cookie if none was found (spec §4.F).
    pub fn bootstrap(storage: Arc<dyn Storage>) -> Result<Self, CoreError> {
        let loaded = storage.load()?;
        let admin_cookie = match loaded.cookie {
            Some(cookie) if cookie.len() == 40 => cookie,
            _ => {
                let cookie = generate_cookie();
                storage.put_cookie(&cookie)?;
                cookie
            }
        };

        let mut vhosts = HashMap::new();
        for loaded_vhost in loaded.vhosts {
            let vhost = Arc::new(Vhost::new(
                loaded_vhost.path.clone(),
                loaded_vhost.access_token,
                storage.clone(),
            ));
            for (name, _kind) in &loaded_vhost.channels {
                vhost.restore_channel(name);
            }
            vhosts.insert(loaded_vhost.path, vhost);
        }

        Ok(Self {
            vhosts: Mutex::new(vhosts),
            endpoints: Mutex::new(Vec::new()),
            storage,
            admin_cookie,
        })
    }

    pub fn register_endpoint(&self, endpoint: Arc<dyn EndpointRegistry>) {
        self.endpoints.lock().unwrap().push(endpoint);
    }

    pub fn admin_cookie(&self) -> &str {
        &self.admin_cookie
    }

    pub fn check_admin_cookie(&self, candidate: &str) -> bool {
        constant_time_eq(candidate.as_bytes(), self.admin_cookie.as_bytes())
    }

    pub fn add_vhost(&self, path: &str) -> Result<Arc<Vhost>, CoreError> {
        validate_vhost_path(path)?;
        let mut vhosts = self.vhosts.lock().unwrap();
        if vhosts.contains_key(path) {
            return Err(CoreError::VhostExists(path.to_owned()));
        }
        let token = random_access_token();
        self.storage.put_vhost(path, &token)?;
        let vhost = Arc::new(Vhost::new(path, token, self.storage.clone()));
        vhosts.insert(path.to_owned(), vhost.clone());
        drop(vhosts);

        for endpoint in self.endpoints.lock().unwrap().iter() {
            endpoint.on_vhost_added(&vhost);
        }
        Ok(vhost)
    }

    pub fn delete_vhost(&self, path: &str) -> Result<(), CoreError> {
        let mut vhosts = self.vhosts.lock().unwrap();
        if vhosts.remove(path).is_none() {
            return Ok(());
        }
        self.storage.delete_vhost(path)?;
        drop(vhosts);

        for endpoint in self.endpoints.lock().unwrap().iter() {
            endpoint.on_vhost_removed(path);
        }
        Ok(())
    }

    pub fn clear_vhosts(&self) -> Result<(), CoreError> {
        let paths: Vec<String> = self.vhosts.lock().unwrap().keys().cloned().collect();
        for path in paths {
            self.delete_vhost(&path)?;
        }
        Ok(())
    }

    pub fn vhost(&self, path: &str) -> Option<Arc<Vhost>> {
        self.vhosts.lock().unwrap().get(path).cloned()
    }

    pub fn vhosts(&self) -> Vec<Arc<Vhost>> {
        self.vhosts.lock().unwrap().values().cloned().collect()
    }
}
