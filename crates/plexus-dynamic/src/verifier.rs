//! Did an unload actually release the module?
//!
//! [`LeakVerifier::verify`] first polls the weak handle of the released
//! execution unit. If the unit outlives the timeout and a deep check was asked
//! for, a [`HeapSnapshotter`] captures the heap and a strong-reference path
//! search from the GC roots decides the outcome. Without a snapshotter the
//! weak handle is trusted.

use async_trait::async_trait;
use chrono::Local;
use error_stack::ResultExt;
use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
use plexus_kernel::{ExecutionUnit, ModuleId, UnitInstanceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DynamicModulesConfig;

// ============================================================================
// Heap snapshot model
// ============================================================================

pub type ObjectId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Strong,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapReference {
    pub target: ObjectId,
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapObject {
    pub label: String,
    /// Execution unit whose code or data this object belongs to.
    pub owner_unit: Option<UnitInstanceId>,
    pub references: Vec<HeapReference>,
}

/// 堆快照
/// Object graph captured from a running host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub objects: BTreeMap<ObjectId, HeapObject>,
    pub roots: Vec<ObjectId>,
}

/// Chain of object labels from a GC root to an object of the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    pub steps: Vec<String>,
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.steps.join(" -> "))
    }
}

/// The path search was cancelled before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("reference path search cancelled")]
pub struct SearchCancelled;

impl HeapSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, id: ObjectId, label: &str, owner_unit: Option<UnitInstanceId>) -> Self {
        self.objects.insert(
            id,
            HeapObject {
                label: label.to_string(),
                owner_unit,
                references: Vec::new(),
            },
        );
        self
    }

    pub fn with_reference(mut self, from: ObjectId, to: ObjectId, kind: ReferenceKind) -> Self {
        if let Some(object) = self.objects.get_mut(&from) {
            object.references.push(HeapReference { target: to, kind });
        }
        self
    }

    pub fn with_root(mut self, id: ObjectId) -> Self {
        self.roots.push(id);
        self
    }

    /// Shortest strong-only paths from the roots to objects owned by `unit`.
    ///
    /// Breadth-first, so each reported path is minimal for its target. Objects
    /// owned by the unit end a path and are not expanded further. At most
    /// `limit` paths are returned.
    pub fn strong_paths_to(
        &self,
        unit: UnitInstanceId,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReferencePath>, SearchCancelled> {
        let mut parent: HashMap<ObjectId, Option<ObjectId>> = HashMap::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();
        for root in &self.roots {
            if self.objects.contains_key(root) && !parent.contains_key(root) {
                parent.insert(*root, None);
                queue.push_back(*root);
            }
        }

        let mut paths = Vec::new();
        let mut visited = 0usize;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            if visited % 1024 == 0 && cancel.is_cancelled() {
                return Err(SearchCancelled);
            }
            let Some(object) = self.objects.get(&current) else {
                continue;
            };
            if object.owner_unit == Some(unit) {
                paths.push(self.path_to(current, &parent));
                if paths.len() >= limit {
                    break;
                }
                continue;
            }
            for reference in &object.references {
                if reference.kind != ReferenceKind::Strong || parent.contains_key(&reference.target) {
                    continue;
                }
                if self.objects.contains_key(&reference.target) {
                    parent.insert(reference.target, Some(current));
                    queue.push_back(reference.target);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(SearchCancelled);
        }
        Ok(paths)
    }

    fn path_to(&self, target: ObjectId, parent: &HashMap<ObjectId, Option<ObjectId>>) -> ReferencePath {
        let mut steps = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            if let Some(object) = self.objects.get(&id) {
                steps.push(object.label.clone());
            }
            cursor = parent.get(&id).copied().flatten();
        }
        steps.reverse();
        ReferencePath { steps }
    }
}

/// 堆快照采集器
/// Captures the host heap
#[async_trait]
pub trait HeapSnapshotter: Send + Sync {
    /// Capture the heap, persisting it at `path`.
    async fn capture(&self, path: &Path) -> LifecycleResult<HeapSnapshot>;
}

// ============================================================================
// Verifier
// ============================================================================

/// Outcome of a leak check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Collected,
    NotCollected {
        /// Snapshot kept for inspection, if one was captured.
        snapshot: Option<PathBuf>,
        paths: Vec<ReferencePath>,
    },
}

impl Verification {
    pub fn is_collected(&self) -> bool {
        matches!(self, Verification::Collected)
    }
}

const MAX_REPORTED_PATHS: usize = 16;

/// 泄漏校验器
/// Confirms that released execution units are collectible
pub struct LeakVerifier {
    snapshotter: Option<Arc<dyn HeapSnapshotter>>,
    snapshot_dir: PathBuf,
    poll_interval: Duration,
    deep_search_timeout: Duration,
    analyze_snapshot: bool,
    shutdown: CancellationToken,
}

impl LeakVerifier {
    pub fn new(config: &DynamicModulesConfig) -> Self {
        Self {
            snapshotter: None,
            snapshot_dir: config.snapshot_dir(),
            poll_interval: config.poll_interval(),
            deep_search_timeout: config.deep_search_timeout(),
            analyze_snapshot: config.analyze_snapshot,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_snapshotter(mut self, snapshotter: Arc<dyn HeapSnapshotter>) -> Self {
        self.snapshotter = Some(snapshotter);
        self
    }

    pub fn has_snapshotter(&self) -> bool {
        self.snapshotter.is_some()
    }

    /// Cancelling this token aborts running path searches.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Snapshot file name for `module` captured now.
    pub fn snapshot_file_name(module: &ModuleId) -> String {
        format!("unload-{module}-{}.snapshot", Local::now().format("%d.%m.%Y_%H.%M.%S"))
    }

    pub async fn verify(
        &self,
        module: &ModuleId,
        unit: &Weak<ExecutionUnit>,
        timeout: Duration,
        deep: bool,
    ) -> Verification {
        if wait_for_collection(unit, timeout, self.poll_interval).await {
            debug!(module = %module, "Execution unit collected");
            return Verification::Collected;
        }

        // Read the id before the search so no strong reference is held during it.
        let Some(unit_id) = unit.upgrade().map(|u| u.instance_id()) else {
            return Verification::Collected;
        };

        let snapshotter = match &self.snapshotter {
            Some(snapshotter) if deep => Arc::clone(snapshotter),
            _ => {
                warn!(module = %module, ?timeout, "Execution unit not collected after unload");
                return Verification::NotCollected {
                    snapshot: None,
                    paths: Vec::new(),
                };
            }
        };

        let path = self.snapshot_dir.join(Self::snapshot_file_name(module));
        let snapshot = match self.capture(snapshotter.as_ref(), &path).await {
            Ok(snapshot) => snapshot,
            Err(report) => {
                warn!(module = %module, "Heap snapshot failed: {:?}", report);
                return Verification::NotCollected {
                    snapshot: None,
                    paths: Vec::new(),
                };
            }
        };
        info!(module = %module, snapshot = %path.display(), "Heap snapshot captured");

        if unit.strong_count() == 0 {
            discard(&path).await;
            return Verification::Collected;
        }
        if !self.analyze_snapshot {
            return Verification::NotCollected {
                snapshot: Some(path),
                paths: Vec::new(),
            };
        }

        match self.search(snapshot, unit_id).await {
            Some(paths) if paths.is_empty() => {
                debug!(module = %module, "No strong reference path to unit, treating as collected");
                discard(&path).await;
                Verification::Collected
            }
            Some(paths) => {
                for found in &paths {
                    warn!(module = %module, path = %found, "Strong reference to unloaded module");
                }
                Verification::NotCollected {
                    snapshot: Some(path),
                    paths,
                }
            }
            None => Verification::NotCollected {
                snapshot: Some(path),
                paths: Vec::new(),
            },
        }
    }

    async fn capture(&self, snapshotter: &dyn HeapSnapshotter, path: &Path) -> LifecycleResult<HeapSnapshot> {
        tokio::fs::create_dir_all(&self.snapshot_dir)
            .await
            .map_err(LifecycleError::from)
            .into_report()
            .attach(format!("creating snapshot directory {}", self.snapshot_dir.display()))?;
        snapshotter
            .capture(path)
            .await
            .attach(format!("capturing heap snapshot {}", path.display()))
    }

    /// `None` when the search timed out or was cancelled.
    async fn search(&self, snapshot: HeapSnapshot, unit: UnitInstanceId) -> Option<Vec<ReferencePath>> {
        let cancel = self.shutdown.child_token();
        let worker_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            snapshot.strong_paths_to(unit, MAX_REPORTED_PATHS, &worker_cancel)
        });

        match tokio::time::timeout(self.deep_search_timeout, handle).await {
            Ok(Ok(Ok(paths))) => Some(paths),
            Ok(Ok(Err(SearchCancelled))) => {
                warn!(unit = %unit, "Reference path search cancelled");
                None
            }
            Ok(Err(e)) => {
                warn!(unit = %unit, "Reference path search failed: {}", e);
                None
            }
            Err(_) => {
                cancel.cancel();
                warn!(
                    unit = %unit,
                    timeout = ?self.deep_search_timeout,
                    "Reference path search timed out"
                );
                None
            }
        }
    }
}

/// Poll until the unit is gone or `timeout` elapses.
async fn wait_for_collection(unit: &Weak<ExecutionUnit>, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if unit.strong_count() == 0 {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(snapshot = %path.display(), "Failed to remove snapshot: {}", e),
    }
}
