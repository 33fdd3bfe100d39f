//! In-memory state shared by every connection.

use std::net::SocketAddr;
use std::sync::Arc;

use drone_core::{Fleet, HolderId, LockTable, Session};
use tokio::sync::broadcast;

use crate::config::Config;

/// Application state: the fleet, its lock table and the shutdown signal.
///
/// Built once in `main` and handed to every handler behind an `Arc`.
pub struct AppState {
    config: Config,
    fleet: Arc<Fleet>,
    locks: Arc<LockTable>,
    shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: Config, fleet: Fleet) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            locks: Arc::new(LockTable::new(config.lock_lease)),
            fleet: Arc::new(fleet),
            config,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    pub fn locks(&self) -> &Arc<LockTable> {
        &self.locks
    }

    /// Start a control session for a freshly connected peer.
    pub fn open_session(&self, peer: SocketAddr) -> Session {
        Session::new(
            HolderId::for_peer(peer),
            self.fleet.clone(),
            self.locks.clone(),
            self.config.queue_capacity,
        )
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Tell every task to stop and drop all locks.
    pub fn shutdown(&self) {
        let notified = self.shutdown_tx.send(()).unwrap_or(0);
        let held = self.locks.len();
        self.locks.clear();
        tracing::info!(
            "Shutdown signalled to {} tasks, cleared {} drone locks",
            notified,
            held
        );
    }
}
