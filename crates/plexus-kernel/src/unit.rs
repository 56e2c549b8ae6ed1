//! Execution units: the reclaimable code/data backing a loaded module.
//!
//! The host keeps the only strong `Arc<ExecutionUnit>`. Everything else that
//! needs to observe a unit holds a `Weak`, which is how the leak verifier
//! decides whether an unload actually released the module.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::module::ModuleId;

/// 执行单元实例标识
/// Unique id of one execution unit instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitInstanceId(Uuid);

impl UnitInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 执行单元状态
/// Execution unit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Active,
    UnloadInProgress,
    Disposed,
}

/// 执行单元
/// Loaded code of one module plus the background tasks it owns
pub struct ExecutionUnit {
    instance_id: UnitInstanceId,
    state: Mutex<UnitState>,
    owner: Mutex<Option<ModuleId>>,
    payload: Box<dyn Any + Send + Sync>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ExecutionUnit {
    pub fn new(owner: ModuleId, payload: Box<dyn Any + Send + Sync>) -> Arc<Self> {
        Arc::new(Self {
            instance_id: UnitInstanceId::new(),
            state: Mutex::new(UnitState::Active),
            owner: Mutex::new(Some(owner)),
            payload,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// A unit without payload.
    pub fn empty(owner: ModuleId) -> Arc<Self> {
        Self::new(owner, Box::new(()))
    }

    pub fn instance_id(&self) -> UnitInstanceId {
        self.instance_id
    }

    pub fn state(&self) -> UnitState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: UnitState) {
        let mut current = self.state.lock();
        debug!(unit = %self.instance_id, from = ?*current, to = ?state, "Unit state change");
        *current = state;
    }

    /// Owning module, `None` after release.
    pub fn owner(&self) -> Option<ModuleId> {
        self.owner.lock().clone()
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Token cancelled when the owning module is unloaded.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a background task owned by this unit.
    ///
    /// The future is dropped as soon as the unit's token is cancelled. The task
    /// must not capture a strong reference to the unit itself.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = future => {}
            }
        });
        self.tasks.lock().push(handle);
    }

    pub fn running_tasks(&self) -> usize {
        self.tasks.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every background task and wait for all of them to finish.
    pub async fn cancel_and_join(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        if handles.is_empty() {
            return;
        }
        debug!(unit = %self.instance_id, tasks = handles.len(), "Joining unit tasks");
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(unit = %self.instance_id, "Unit task panicked: {}", e);
                }
            }
        }
    }

    /// Clear the back-pointer and mark the unit disposed.
    pub fn release(&self) {
        self.owner.lock().take();
        self.set_state(UnitState::Disposed);
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("instance_id", &self.instance_id)
            .field("state", &self.state())
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}
