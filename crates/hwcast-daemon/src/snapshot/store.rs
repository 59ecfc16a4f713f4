//! Single-cell holder for the current snapshot.

use arc_swap::ArcSwap;
use std::sync::Arc;

use super::Snapshot;

/// Holds exactly one current snapshot.
///
/// Readers get an `Arc` to a complete snapshot and never wait on a writer.
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    /// Creates a store holding an empty snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    /// Installs a new current snapshot and returns a handle to it.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Returns the snapshot current at the time of the call.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
