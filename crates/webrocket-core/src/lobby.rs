//! The per-vhost round-robin worker pool and its FIFO trigger queue
//! (spec §4.I). Worker liveness (heartbeats, read timeouts) is a property
//! of the actual backend socket and lives in `server`; this module only
//! owns the ring and the dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Defaults per §4.I, overridable via config (spec "Configuration").
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Whatever can accept a `TR <json>` trigger. Implemented by the backend
/// connection wrapper in `server`.
pub trait WorkerSink: Send + Sync {
    fn id(&self) -> &str;
    fn send_trigger(&self, payload: Value) -> bool;
}

#[derive(Default)]
struct WorkerRing {
    order: Vec<String>,
    by_id: HashMap<String, Arc<dyn WorkerSink>>,
    cursor: usize,
}

impl WorkerRing {
    fn add(&mut self, worker: Arc<dyn WorkerSink>) {
        let id = worker.id().to_owned();
        if !self.by_id.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.by_id.insert(id, worker);
    }

    fn remove(&mut self, id: &str) {
        self.by_id.remove(id);
        self.order.retain(|existing| existing != id);
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
    }

    /// Advance past dead slots (spec §4.I: "advancing past a worker whose
    /// id is no longer in the live map silently unlinks that slot and
    /// retries").
    fn next(&mut self) -> Option<Arc<dyn WorkerSink>> {
        while !self.order.is_empty() {
            if self.cursor >= self.order.len() {
                self.cursor = 0;
            }
            let id = self.order[self.cursor].clone();
            match self.by_id.get(&id).cloned() {
                Some(worker) => {
                    self.cursor = (self.cursor + 1) % self.order.len();
                    return Some(worker);
                }
                None => {
                    self.order.remove(self.cursor);
                }
            }
        }
        None
    }
}

pub struct Lobby {
    ring: Mutex<WorkerRing>,
    queue_tx: mpsc::UnboundedSender<Value>,
    retry_delay: Duration,
    max_retries: u32,
}

impl Lobby {
    /// `retry_delay`/`max_retries` govern how long the dispatcher waits for
    /// a worker to appear before dropping a trigger (spec §4.I, defaulted
    /// per `DEFAULT_RETRY_DELAY`/`DEFAULT_MAX_RETRIES` but overridable via
    /// config).
    pub fn new(retry_delay: Duration, max_retries: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                ring: Mutex::new(WorkerRing::default()),
                queue_tx,
                retry_delay,
                max_retries,
            }),
            queue_rx,
        )
    }

    /// First message from a new worker triggers this (spec §4.I: "`RD`
    /// triggers `addWorker`").
    pub fn add_worker(&self, worker: Arc<dyn WorkerSink>) {
        self.ring.lock().unwrap().add(worker);
    }

    /// Called when a worker's listen loop exits (expiry, `QT`, or EOF).
    pub fn remove_worker(&self, id: &str) {
        self.ring.lock().unwrap().remove(id);
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.ring.lock().unwrap().order.clone()
    }

    /// Enqueue a trigger payload (spec §4.I: `Trigger(vhost, payload)`).
    /// Returns false if the dispatcher has already shut down.
    pub fn trigger(&self, payload: Value) -> bool {
        self.queue_tx.send(payload).is_ok()
    }

    /// The single serialized dispatcher task (spec §5). Runs until the
    /// queue is closed, which happens when every `Lobby` handle (and this
    /// clone of `queue_tx`) is dropped.
    pub async fn run_dispatcher(self: Arc<Self>, mut queue_rx: mpsc::UnboundedReceiver<Value>) {
        while let Some(payload) = queue_rx.recv().await {
            let mut attempt = 0u32;
            loop {
                let worker = self.ring.lock().unwrap().next();
                match worker {
                    Some(worker) => {
                        if !worker.send_trigger(payload.clone()) {
                            warn!(worker = worker.id(), "trigger send failed, not re-enqueued");
                        }
                        break;
                    }
                    None if attempt < self.max_retries => {
                        attempt += 1;
                        sleep(self.retry_delay).await;
                    }
                    None => {
                        warn!(retries = self.max_retries, "no worker available, dropping trigger");
                        break;
                    }
                }
            }
        }
    }
}
