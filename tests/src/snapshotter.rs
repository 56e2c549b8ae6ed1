use async_trait::async_trait;
use parking_lot::Mutex;
use plexus_dynamic::{HeapSnapshot, HeapSnapshotter};
use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
use std::path::{Path, PathBuf};

/// Serves a prepared object graph and writes it to the requested path as JSON.
#[derive(Debug, Default)]
pub struct FakeHeapSnapshotter {
    snapshot: Mutex<HeapSnapshot>,
    captured: Mutex<Vec<PathBuf>>,
}

impl FakeHeapSnapshotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph returned by the next captures. Usually set once the unit id is known.
    pub fn set_snapshot(&self, snapshot: HeapSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn captured(&self) -> Vec<PathBuf> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl HeapSnapshotter for FakeHeapSnapshotter {
    async fn capture(&self, path: &Path) -> LifecycleResult<HeapSnapshot> {
        let snapshot = self.snapshot.lock().clone();
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(LifecycleError::from)
            .into_report()?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(LifecycleError::from)
            .into_report()?;
        self.captured.lock().push(path.to_path_buf());
        Ok(snapshot)
    }
}
