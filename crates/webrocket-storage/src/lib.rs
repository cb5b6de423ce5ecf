//! A `sled`-backed implementation of `webrocket_core::Storage`
//! (spec §4.E, §3 "Storage records").
//!
//! Records use `|`-namespaced keys: `v|<path>` → `<path>;<token>`,
//! `ch|<path>|<name>` → `<name>;<kind-int>`. The admin cookie is not a KV
//! record — it lives in a plain `cookie` file beside the database, per
//! spec §4.F.

use std::path::{Path, PathBuf};

use webrocket_core::{ChannelKind, LoadedState, LoadedVhost, Storage, StorageError};

pub struct SledStorage {
    db: sled::Db,
    cookie_path: PathBuf,
}

fn backend_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn vhost_key(path: &str) -> Vec<u8> {
    format!("v|{path}").into_bytes()
}

fn channel_key(vhost_path: &str, name: &str) -> Vec<u8> {
    format!("ch|{vhost_path}|{name}").into_bytes()
}

fn channel_prefix(vhost_path: &str) -> Vec<u8> {
    format!("ch|{vhost_path}|").into_bytes()
}

fn kind_to_int(kind: ChannelKind) -> u8 {
    match kind {
        ChannelKind::Normal => 0,
        ChannelKind::Private => 1,
        ChannelKind::Presence => 2,
    }
}

fn int_to_kind(raw: u8) -> ChannelKind {
    match raw {
        1 => ChannelKind::Private,
        2 => ChannelKind::Presence,
        _ => ChannelKind::Normal,
    }
}

impl SledStorage {
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir).map_err(backend_err)?;
        let db = sled::open(base_dir.join("db")).map_err(backend_err)?;
        Ok(Self {
            db,
            cookie_path: base_dir.join("cookie"),
        })
    }
}

impl Storage for SledStorage {
    fn put_vhost(&self, path: &str, access_token: &str) -> Result<(), StorageError> {
        let value = format!("{path};{access_token}");
        self.db
            .insert(vhost_key(path), value.as_bytes())
            .map_err(backend_err)?;
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn delete_vhost(&self, path: &str) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        batch.remove(vhost_key(path));
        for entry in self.db.scan_prefix(channel_prefix(path)) {
            let (key, _) = entry.map_err(backend_err)?;
            batch.remove(key);
        }
        self.db.apply_batch(batch).map_err(backend_err)?;
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn put_channel(&self, vhost_path: &str, name: &str, kind: ChannelKind) -> Result<(), StorageError> {
        let value = format!("{name};{}", kind_to_int(kind));
        self.db
            .insert(channel_key(vhost_path, name), value.as_bytes())
            .map_err(backend_err)?;
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn delete_channel(&self, vhost_path: &str, name: &str) -> Result<(), StorageError> {
        self.db
            .remove(channel_key(vhost_path, name))
            .map_err(backend_err)?;
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn put_cookie(&self, cookie: &str) -> Result<(), StorageError> {
        std::fs::write(&self.cookie_path, cookie).map_err(backend_err)
    }

    fn load(&self) -> Result<LoadedState, StorageError> {
        let cookie = std::fs::read_to_string(&self.cookie_path)
            .ok()
            .map(|raw| raw.trim().to_owned());

        let mut vhosts = Vec::new();
        for entry in self.db.scan_prefix(b"v|") {
            let (key, value) = entry.map_err(backend_err)?;
            let key = String::from_utf8_lossy(&key);
            let path = key
                .strip_prefix("v|")
                .ok_or_else(|| backend_err("malformed vhost key"))?
                .to_owned();
            let value = String::from_utf8_lossy(&value);
            let (_path, access_token) = value
                .split_once(';')
                .ok_or_else(|| backend_err("malformed vhost record"))?;

            let mut channels = Vec::new();
            for channel_entry in self.db.scan_prefix(channel_prefix(&path)) {
                let (_key, value) = channel_entry.map_err(backend_err)?;
                let value = String::from_utf8_lossy(&value);
                let (name, kind_raw) = value
                    .split_once(';')
                    .ok_or_else(|| backend_err("malformed channel record"))?;
                let kind = int_to_kind(kind_raw.parse().unwrap_or(0));
                channels.push((name.to_owned(), kind));
            }

            vhosts.push(LoadedVhost {
                path,
                access_token: access_token.to_owned(),
                channels,
            });
        }

        Ok(LoadedState { cookie, vhosts })
    }
}
