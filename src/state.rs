use std::sync::Arc;

use crate::{leak::LeakStore, repository::ItemRepository, snapshot::SnapshotCapturer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ItemRepository>,
    pub leaks: Arc<LeakStore>,
    pub snapshots: SnapshotCapturer,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        leaks: Arc<LeakStore>,
        snapshots: SnapshotCapturer,
    ) -> Self {
        Self {
            repo,
            leaks,
            snapshots,
        }
    }
}
