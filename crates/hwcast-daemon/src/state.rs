//! Application state shared by the poll loop and request handlers.

use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::snapshot::SnapshotStore;

/// Shared application state.
pub struct AppState {
    /// Latest snapshot, read by the pull API
    store: SnapshotStore,

    /// Push subscribers
    broadcaster: Broadcaster,

    /// WebSocket keep-alive ping interval
    keepalive: Option<Duration>,
}

impl AppState {
    /// Creates state with an empty snapshot and no subscribers.
    pub fn new(config: &Config) -> Self {
        Self {
            store: SnapshotStore::new(),
            broadcaster: Broadcaster::new(config.send_timeout(), config.send_queue_depth),
            keepalive: config.keepalive(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn keepalive(&self) -> Option<Duration> {
        self.keepalive
    }
}
