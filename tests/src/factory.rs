use async_trait::async_trait;
use parking_lot::Mutex;
use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
use plexus_kernel::host::ExecutionUnitFactory;
use plexus_kernel::{ExecutionUnit, ModuleDescriptor, ModuleId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the factory does when asked for a module's unit.
#[derive(Debug, Clone, Default)]
pub struct UnitScript {
    /// Spawn a task that runs until the unit is cancelled.
    pub background_task: bool,
    /// Refuse to create the unit.
    pub fail: bool,
}

impl UnitScript {
    pub fn with_background_task() -> Self {
        Self {
            background_task: true,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            background_task: false,
            fail: true,
        }
    }
}

/// Sets its flag when dropped together with the task future holding it.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Execution unit factory driven by per-module scripts.
#[derive(Default)]
pub struct ScriptedUnitFactory {
    scripts: Mutex<HashMap<ModuleId, UnitScript>>,
    created: Mutex<Vec<ModuleId>>,
    /// module -> "background task stopped" flag of the latest unit
    stopped: Mutex<HashMap<ModuleId, Arc<AtomicBool>>>,
}

impl ScriptedUnitFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, module: &str, script: UnitScript) {
        self.scripts.lock().insert(ModuleId::from(module), script);
    }

    /// Modules a unit was created for, in creation order.
    pub fn created(&self) -> Vec<ModuleId> {
        self.created.lock().clone()
    }

    /// Whether the background task of the module's latest unit has stopped.
    pub fn task_stopped(&self, module: &str) -> Option<bool> {
        self.stopped
            .lock()
            .get(&ModuleId::from(module))
            .map(|flag| flag.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ExecutionUnitFactory for ScriptedUnitFactory {
    async fn create(&self, descriptor: &ModuleDescriptor) -> LifecycleResult<Arc<ExecutionUnit>> {
        let script = self.scripts.lock().get(&descriptor.id).cloned().unwrap_or_default();
        if script.fail {
            return Err(LifecycleError::Unit(format!("scripted failure for {}", descriptor.id))).into_report();
        }

        let unit = ExecutionUnit::empty(descriptor.id.clone());
        if script.background_task {
            let flag = Arc::new(AtomicBool::new(false));
            self.stopped.lock().insert(descriptor.id.clone(), Arc::clone(&flag));
            let guard = DropFlag(flag);
            unit.spawn(async move {
                let _guard = guard;
                std::future::pending::<()>().await;
            });
        }
        self.created.lock().push(descriptor.id.clone());
        Ok(unit)
    }
}
