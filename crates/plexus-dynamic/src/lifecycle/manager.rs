//! Module lifecycle manager
//!
//! Drives load and unload batches against a [`HostEnvironment`]. Batches are
//! serialized on one operation lock; the module set is an immutable snapshot
//! swapped after each module is wired in or torn down.
//!
//! A batch future should be driven to completion. Dropping it after the
//! quiesce step leaves the host half torn down.

use parking_lot::{Mutex, RwLock};
use plexus_kernel::error::LifecycleResult;
use plexus_kernel::host::{
    CacheScope, ExecutionUnitFactory, HostEnvironment, LifecycleListener, ListenerCallbacks, ModuleStateStore,
};
use plexus_kernel::{Direction, ExecutionUnit, ModuleDescriptor, ModuleId, ModuleSet, UnitState};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::event::{BatchOutcome, LifecycleEvent, LoadPhase, ModuleReport, UnloadPhase};
use super::options::{LoadOptions, UnloadOptions};
use crate::config::DynamicModulesConfig;
use crate::extensions::{sub_descriptor_owner, ExtensionWiring};
use crate::safety::{SafetyContext, UnloadBlocked, UnloadSafety};
use crate::verifier::{HeapSnapshotter, LeakVerifier, Verification};
use crate::zombie::ZombieRegistry;

pub type AfterBatchCallback = Box<dyn FnOnce() + Send>;

/// Unload batch after planning: members in teardown order.
struct UnloadPlan {
    members: Vec<Arc<ModuleDescriptor>>,
}

/// Load batch after planning: the successor set and members in wiring order.
struct LoadPlan {
    target: ModuleSet,
    members: Vec<Arc<ModuleDescriptor>>,
}

/// Held for the duration of a batch.
struct BatchGuard<'a> {
    manager: &'a ModuleLifecycleManager,
    _lock: tokio::sync::MutexGuard<'a, ()>,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.manager.finish_batch();
    }
}

/// 模块生命周期管理器
/// Loads and unloads modules without restarting the host
pub struct ModuleLifecycleManager {
    config: DynamicModulesConfig,
    host: Arc<dyn HostEnvironment>,
    factory: Arc<dyn ExecutionUnitFactory>,
    store: Option<Arc<dyn ModuleStateStore>>,
    verifier: LeakVerifier,
    /// Published module set
    set: RwLock<Arc<ModuleSet>>,
    operation: tokio::sync::Mutex<()>,
    in_progress: AtomicUsize,
    after_batch: Mutex<Vec<AfterBatchCallback>>,
    /// The only strong references to loaded execution units
    units: Mutex<HashMap<ModuleId, Arc<ExecutionUnit>>>,
    zombies: ZombieRegistry,
    restart_required: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl ModuleLifecycleManager {
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        factory: Arc<dyn ExecutionUnitFactory>,
        set: ModuleSet,
        config: DynamicModulesConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            verifier: LeakVerifier::new(&config),
            config,
            host,
            factory,
            store: None,
            set: RwLock::new(Arc::new(set)),
            operation: tokio::sync::Mutex::new(()),
            in_progress: AtomicUsize::new(0),
            after_batch: Mutex::new(Vec::new()),
            units: Mutex::new(HashMap::new()),
            zombies: ZombieRegistry::new(),
            restart_required: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ModuleStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_snapshotter(mut self, snapshotter: Arc<dyn HeapSnapshotter>) -> Self {
        self.verifier = LeakVerifier::new(&self.config).with_snapshotter(snapshotter);
        self
    }

    pub fn with_listener(self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current module set. Hold it for the duration of one read.
    pub fn snapshot(&self) -> Arc<ModuleSet> {
        self.set.read().clone()
    }

    pub fn config(&self) -> &DynamicModulesConfig {
        &self.config
    }

    pub fn zombies(&self) -> &ZombieRegistry {
        &self.zombies
    }

    /// Whether `id` has a live execution unit.
    pub fn is_loaded(&self, id: &ModuleId) -> bool {
        self.units.lock().contains_key(id)
    }

    /// Execution unit of a loaded module.
    ///
    /// The returned handle keeps the unit alive; drop it before unloading or
    /// the leak verifier will report it.
    pub fn unit(&self, id: &ModuleId) -> Option<Arc<ExecutionUnit>> {
        self.units.lock().get(id).cloned()
    }

    /// A teardown failed or a unit leaked; further dynamic operations are refused.
    pub fn restart_required(&self) -> bool {
        self.restart_required.load(Ordering::SeqCst)
    }

    pub fn batches_in_progress(&self) -> usize {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Would unloading `ids` go through right now?
    pub fn can_unload(&self, ids: &[ModuleId]) -> Result<(), UnloadBlocked> {
        let set = self.snapshot();
        let options = UnloadOptions::default();
        let plan = self.plan_unload(&set, ids, &options)?;
        self.check(&set, &plan.members, options.check_implementation_details)
    }

    /// Would loading `descriptors` go through right now?
    pub fn can_load(&self, descriptors: &[Arc<ModuleDescriptor>]) -> Result<(), UnloadBlocked> {
        let set = self.snapshot();
        self.plan_load(&set, descriptors, &LoadOptions::default()).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Batch bookkeeping
    // ------------------------------------------------------------------------

    /// Run `callback` once no batch is in progress.
    pub fn run_after_batch(&self, callback: impl FnOnce() + Send + 'static) {
        let mut queue = self.after_batch.lock();
        if self.in_progress.load(Ordering::SeqCst) > 0 {
            queue.push(Box::new(callback));
            return;
        }
        drop(queue);
        callback();
    }

    async fn begin_batch(&self) -> BatchGuard<'_> {
        let lock = self.operation.lock().await;
        self.in_progress.fetch_add(1, Ordering::SeqCst);
        BatchGuard {
            manager: self,
            _lock: lock,
        }
    }

    fn finish_batch(&self) {
        let callbacks = {
            let mut queue = self.after_batch.lock();
            self.in_progress.fetch_sub(1, Ordering::SeqCst);
            std::mem::take(&mut *queue)
        };
        if !callbacks.is_empty() {
            debug!(count = callbacks.len(), "Running post-batch callbacks");
        }
        for callback in callbacks {
            callback();
        }
    }

    fn publish(&self, set: ModuleSet) -> Arc<ModuleSet> {
        let set = Arc::new(set);
        *self.set.write() = Arc::clone(&set);
        debug!(generation = set.generation(), enabled = set.enabled_ids().len(), "Module set published");
        set
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn unload_phase(&self, module: &ModuleId, phase: UnloadPhase) {
        debug!(module = %module, phase = %phase, "Unload phase");
        self.emit(LifecycleEvent::Unload {
            module: module.clone(),
            phase,
        });
    }

    fn load_phase(&self, module: &ModuleId, phase: LoadPhase) {
        debug!(module = %module, phase = %phase, "Load phase");
        self.emit(LifecycleEvent::Load {
            module: module.clone(),
            phase,
        });
    }

    fn require_restart(&self, module: &ModuleId, reason: &str) {
        self.restart_required.store(true, Ordering::SeqCst);
        warn!(module = %module, reason = %reason, "Host restart required");
        self.emit(LifecycleEvent::RestartRequired {
            module: module.clone(),
            reason: reason.to_string(),
        });
    }

    fn listeners(&self) -> Vec<Arc<dyn LifecycleListener>> {
        self.listeners.read().clone()
    }

    fn check(
        &self,
        set: &ModuleSet,
        batch: &[Arc<ModuleDescriptor>],
        check_implementation_details: bool,
    ) -> Result<(), UnloadBlocked> {
        let cx = SafetyContext {
            set,
            batch,
            host: self.host.as_ref(),
            zombies: &self.zombies,
            config: &self.config,
            restart_required: self.restart_required(),
        };
        UnloadSafety::check_batch(&cx, check_implementation_details)
    }

    async fn save_state(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let state = self.snapshot().state();
        if let Err(report) = store.save(&state).await {
            warn!("Failed to save module state: {:?}", report);
        }
    }

    /// Record a wiring failure on `report`, keeping the first one.
    fn record_failure(&self, report: &mut ModuleReport, what: &str, result: LifecycleResult<()>) {
        if let Err(failure) = result {
            warn!(module = %report.module, "{} failed: {:?}", what, failure);
            if report.error.is_none() {
                report.error = Some(format!("{what} failed: {}", failure.current_context()));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Unload
    // ------------------------------------------------------------------------

    pub async fn unload_module(&self, id: &ModuleId, options: UnloadOptions) -> BatchOutcome {
        self.unload_modules(std::slice::from_ref(id), options).await
    }

    /// Unload `ids` together with every loaded module that cannot stay loaded without them.
    pub async fn unload_modules(&self, ids: &[ModuleId], options: UnloadOptions) -> BatchOutcome {
        let _batch = self.begin_batch().await;
        let set = self.snapshot();
        for id in ids {
            self.unload_phase(id, UnloadPhase::Requested);
        }

        let plan = match self
            .plan_unload(&set, ids, &options)
            .and_then(|plan| self.check(&set, &plan.members, options.check_implementation_details).map(|_| plan))
        {
            Ok(plan) => plan,
            Err(blocked) => {
                warn!(module = %blocked.module, reason = %blocked.reason, "Unload blocked");
                self.emit(LifecycleEvent::Blocked {
                    module: blocked.module.clone(),
                    reason: blocked.reason.clone(),
                });
                return BatchOutcome::Blocked(blocked);
            }
        };
        for member in &plan.members {
            self.unload_phase(&member.id, UnloadPhase::SafetyChecked);
        }

        self.host.flush_event_queue();
        let listeners = self.listeners();
        for member in &plan.members {
            for listener in &listeners {
                if let Err(veto) = listener.before_unload(member, options.is_update) {
                    info!(module = %member.id, reason = %veto.reason, "Unload vetoed");
                    self.unload_phase(&member.id, UnloadPhase::Vetoed);
                    return BatchOutcome::Vetoed {
                        module: member.id.clone(),
                        reason: veto.reason,
                    };
                }
            }
        }
        for member in &plan.members {
            self.unload_phase(&member.id, UnloadPhase::Quiesced);
        }

        let batch_ids: BTreeSet<ModuleId> = plan.members.iter().map(|m| m.id.clone()).collect();
        let mut reports = Vec::with_capacity(plan.members.len());
        for member in &plan.members {
            reports.push(self.unload_member(member, ids, &batch_ids, &options, &listeners).await);
        }

        // Requested modules that were not loaded only change the set.
        for id in ids.iter().filter(|id| !batch_ids.contains(*id)) {
            let current = self.snapshot();
            self.publish(derive_unloaded(&current, id, &options));
        }

        let restart_required = reports.iter().any(|r| r.restart_required);
        if options.save {
            self.save_state().await;
        }
        info!(
            modules = ?batch_ids,
            restart_required,
            "Unload batch finished"
        );
        BatchOutcome::Completed {
            reports,
            restart_required,
        }
    }

    fn plan_unload(&self, set: &ModuleSet, ids: &[ModuleId], options: &UnloadOptions) -> Result<UnloadPlan, UnloadBlocked> {
        let mut target: Option<ModuleSet> = None;
        for id in ids {
            if !set.contains(id) {
                return Err(UnloadBlocked {
                    module: id.clone(),
                    reason: format!("Module {id} is not part of the module set"),
                });
            }
            let base = target.as_ref().unwrap_or(set);
            target = Some(derive_unloaded(base, id, options));
        }
        let Some(target) = target else {
            return Ok(UnloadPlan { members: Vec::new() });
        };

        let mut members: Vec<Arc<ModuleDescriptor>> = set
            .enabled_descriptors()
            .filter(|d| !target.is_enabled(&d.id))
            .cloned()
            .collect();
        set.ordering_for(&members).sort(&mut members, Direction::Unload);
        Ok(UnloadPlan { members })
    }

    async fn unload_member(
        &self,
        member: &Arc<ModuleDescriptor>,
        requested: &[ModuleId],
        batch_ids: &BTreeSet<ModuleId>,
        options: &UnloadOptions,
        listeners: &[Arc<dyn LifecycleListener>],
    ) -> ModuleReport {
        let id = &member.id;
        let host = self.host.as_ref();
        let mut report = ModuleReport::new(id.clone());
        let set = self.snapshot();

        let unit = self.units.lock().remove(id);
        if let Some(unit) = &unit {
            unit.set_state(UnitState::UnloadInProgress);
        }
        for listener in listeners {
            listener.unloading(member, options.is_update);
        }

        for contribution in set.loaded_optional_dependents(id) {
            if batch_ids.contains(&contribution.dependent.id) {
                continue;
            }
            let owner = sub_descriptor_owner(&contribution.declared_by, id);
            let result = ExtensionWiring::unregister(&contribution.sub, &owner, None, host, true);
            self.record_failure(&mut report, &format!("unregistering {owner}"), result);
        }
        for (target, sub) in set.loaded_sub_descriptors(member).into_iter().rev() {
            let owner = sub_descriptor_owner(id, &target);
            let result = ExtensionWiring::unregister(&sub, &owner, None, host, true);
            self.record_failure(&mut report, &format!("unregistering {owner}"), result);
        }
        for content in &member.content_modules {
            for (target, sub) in set.loaded_sub_descriptors(content).into_iter().rev() {
                let owner = sub_descriptor_owner(&content.id, &target);
                let result = ExtensionWiring::unregister(&sub, &owner, None, host, true);
                self.record_failure(&mut report, &format!("unregistering {owner}"), result);
            }
            let result = ExtensionWiring::unregister(content, &content.id, None, host, true);
            self.record_failure(&mut report, &format!("unregistering content module {}", content.id), result);
        }
        let result = ExtensionWiring::unregister(member, id, unit.as_deref(), host, true);
        self.record_failure(&mut report, &format!("unregistering {id}"), result);

        if requested.contains(id) {
            let current = self.snapshot();
            self.publish(derive_unloaded(&current, id, options));
        }
        self.unload_phase(id, UnloadPhase::Unregistered);

        if let Some(unit) = &unit {
            unit.cancel_and_join().await;
        }
        for listener in listeners {
            listener.unloaded(member, options.is_update);
        }
        self.unload_phase(id, UnloadPhase::Disposed);

        let verification = match unit {
            None => Some(Verification::Collected),
            Some(unit) => {
                let weak = Arc::downgrade(&unit);
                let unit_id = unit.instance_id();
                self.zombies.record(id.clone(), weak.clone());
                unit.release();
                drop(unit);
                self.host.clear_caches(CacheScope::Unit(unit_id));
                self.unload_phase(id, UnloadPhase::UnitReleased);

                if options.wait_for_unit_unload {
                    let timeout = options.unload_timeout.unwrap_or_else(|| self.config.unload_timeout());
                    let deep = options.require_memory_snapshot || self.config.snapshot_on_unload_fail;
                    Some(self.verifier.verify(id, &weak, timeout, deep).await)
                } else if weak.strong_count() == 0 {
                    Some(Verification::Collected)
                } else {
                    debug!(module = %id, "Unit still referenced, left in zombie registry");
                    None
                }
            }
        };
        if matches!(verification, Some(Verification::Collected)) {
            self.zombies.remove(id);
        }
        self.unload_phase(id, UnloadPhase::Verified);

        if let Some(error) = &report.error {
            self.unload_phase(id, UnloadPhase::Failed);
            self.require_restart(id, error);
            report.restart_required = true;
        } else if verification.as_ref().is_some_and(|v| !v.is_collected()) {
            self.require_restart(id, &format!("execution unit of {id} was not collected"));
            report.restart_required = true;
        } else {
            info!(module = %id, "Module unloaded");
        }
        report.verification = verification;
        report
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    pub async fn load_module(&self, descriptor: Arc<ModuleDescriptor>, options: LoadOptions) -> BatchOutcome {
        self.load_modules(vec![descriptor], options).await
    }

    /// Load `descriptors` together with every known module they make loadable.
    pub async fn load_modules(&self, descriptors: Vec<Arc<ModuleDescriptor>>, options: LoadOptions) -> BatchOutcome {
        let _batch = self.begin_batch().await;
        let set = self.snapshot();
        for descriptor in &descriptors {
            self.load_phase(&descriptor.id, LoadPhase::Requested);
        }

        let plan = match self.plan_load(&set, &descriptors, &options) {
            Ok(plan) => plan,
            Err(blocked) => {
                warn!(module = %blocked.module, reason = %blocked.reason, "Load rejected");
                self.load_phase(&blocked.module, LoadPhase::Rejected);
                self.emit(LifecycleEvent::Blocked {
                    module: blocked.module.clone(),
                    reason: blocked.reason.clone(),
                });
                return BatchOutcome::Rejected(blocked);
            }
        };

        self.publish(plan.target);
        for member in &plan.members {
            self.load_phase(&member.id, LoadPhase::DependenciesResolved);
        }

        let listeners = self.listeners();
        let batch_ids: BTreeSet<ModuleId> = plan.members.iter().map(|m| m.id.clone()).collect();
        let mut reports = Vec::with_capacity(plan.members.len());
        for member in &plan.members {
            reports.push(self.load_member(member, &batch_ids, &listeners).await);
        }

        let restart_required = reports.iter().any(|r| r.restart_required);
        if options.save {
            self.save_state().await;
        }
        info!(modules = ?batch_ids, "Load batch finished");
        BatchOutcome::Completed {
            reports,
            restart_required,
        }
    }

    fn plan_load(
        &self,
        set: &ModuleSet,
        descriptors: &[Arc<ModuleDescriptor>],
        options: &LoadOptions,
    ) -> Result<LoadPlan, UnloadBlocked> {
        if descriptors.is_empty() {
            return Ok(LoadPlan {
                target: set.clone(),
                members: Vec::new(),
            });
        }
        if let Some(loaded) = descriptors.iter().find(|d| self.is_loaded(&d.id)) {
            return Err(UnloadBlocked {
                module: loaded.id.clone(),
                reason: format!("Module {} is already loaded", loaded.id),
            });
        }
        let target = set.with_modules(descriptors.iter().cloned(), true);

        for descriptor in descriptors {
            if let Some(error) = target
                .rejected()
                .iter()
                .find(|e| e.affected_modules().contains(&&descriptor.id))
            {
                return Err(UnloadBlocked {
                    module: descriptor.id.clone(),
                    reason: error.to_string(),
                });
            }
        }

        let mut members: Vec<Arc<ModuleDescriptor>> = target
            .enabled_descriptors()
            .filter(|d| !set.is_enabled(&d.id))
            .cloned()
            .collect();
        // Requested modules whose dependencies are missing go through the
        // safety check so the refusal names the missing dependency.
        for descriptor in descriptors {
            if !members.iter().any(|m| m.id == descriptor.id) {
                members.push(Arc::clone(descriptor));
            }
        }

        self.check(set, &members, options.check_implementation_details)?;
        set.ordering_for(&members).sort(&mut members, Direction::Load);
        Ok(LoadPlan { target, members })
    }

    async fn load_member(
        &self,
        member: &Arc<ModuleDescriptor>,
        batch_ids: &BTreeSet<ModuleId>,
        listeners: &[Arc<dyn LifecycleListener>],
    ) -> ModuleReport {
        let id = &member.id;
        let host = self.host.as_ref();
        let mut report = ModuleReport::new(id.clone());

        let current = self.snapshot();
        if !current.is_enabled(id) {
            // A dependency earlier in the batch failed.
            report.error = Some(format!("Module {id} lost a required dependency during the batch"));
            self.load_phase(id, LoadPhase::Rejected);
            return report;
        }

        for listener in listeners {
            listener.before_load(member);
        }
        let unit = match self.factory.create(member).await {
            Ok(unit) => unit,
            Err(failure) => {
                warn!(module = %id, "Execution unit creation failed: {:?}", failure);
                report.error = Some(format!("creating execution unit failed: {}", failure.current_context()));
                self.publish(current.with_enabled(id, false));
                self.load_phase(id, LoadPhase::Rejected);
                return report;
            }
        };
        self.units.lock().insert(id.clone(), unit);

        let mut callbacks = ListenerCallbacks::new();
        let result = ExtensionWiring::register(member, id, host, &mut callbacks);
        self.record_failure(&mut report, &format!("registering {id}"), result);
        for content in &member.content_modules {
            let result = ExtensionWiring::register(content, &content.id, host, &mut callbacks);
            self.record_failure(&mut report, &format!("registering content module {}", content.id), result);
            for (target, sub) in current.loaded_sub_descriptors(content) {
                let owner = sub_descriptor_owner(&content.id, &target);
                let result = ExtensionWiring::register(&sub, &owner, host, &mut callbacks);
                self.record_failure(&mut report, &format!("registering {owner}"), result);
            }
        }
        for (target, sub) in current.loaded_sub_descriptors(member) {
            let owner = sub_descriptor_owner(id, &target);
            let result = ExtensionWiring::register(&sub, &owner, host, &mut callbacks);
            self.record_failure(&mut report, &format!("registering {owner}"), result);
        }
        for contribution in current.loaded_optional_dependents(id) {
            let dependent = &contribution.dependent.id;
            if batch_ids.contains(dependent) || !self.is_loaded(dependent) {
                continue;
            }
            let owner = sub_descriptor_owner(&contribution.declared_by, id);
            let result = ExtensionWiring::register(&contribution.sub, &owner, host, &mut callbacks);
            self.record_failure(&mut report, &format!("registering {owner}"), result);
        }
        callbacks.run();
        self.load_phase(id, LoadPhase::Registered);

        if let Some(error) = &report.error {
            self.require_restart(id, error);
            report.restart_required = true;
        }
        for listener in listeners {
            listener.loaded(member);
        }
        self.load_phase(id, LoadPhase::Activated);
        info!(module = %id, version = %member.version, "Module loaded");
        report
    }

    /// Wire in every enabled module that has no execution unit yet.
    ///
    /// Used at startup, when the initial set is enabled but nothing is
    /// registered. No safety check runs.
    pub async fn activate_enabled(&self) -> BatchOutcome {
        let _batch = self.begin_batch().await;
        let set = self.snapshot();
        let loaded: BTreeSet<ModuleId> = self.units.lock().keys().cloned().collect();
        let mut members: Vec<Arc<ModuleDescriptor>> = set
            .enabled_descriptors()
            .filter(|d| !loaded.contains(&d.id))
            .cloned()
            .collect();
        set.ordering_for(&members).sort(&mut members, Direction::Load);

        let listeners = self.listeners();
        let batch_ids: BTreeSet<ModuleId> = members.iter().map(|m| m.id.clone()).collect();
        let mut reports = Vec::with_capacity(members.len());
        for member in &members {
            self.load_phase(&member.id, LoadPhase::Requested);
            reports.push(self.load_member(member, &batch_ids, &listeners).await);
        }
        let restart_required = reports.iter().any(|r| r.restart_required);
        info!(modules = batch_ids.len(), "Enabled modules activated");
        BatchOutcome::Completed {
            reports,
            restart_required,
        }
    }
}

fn derive_unloaded(set: &ModuleSet, id: &ModuleId, options: &UnloadOptions) -> ModuleSet {
    if options.disable {
        set.with_enabled(id, false)
    } else {
        set.without_module(id)
    }
}
