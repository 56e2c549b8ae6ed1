//! In-memory host
//!
//! A complete [`HostEnvironment`] backed by plain maps. Every registry
//! mutation is appended to a shared trace so callers can assert on the exact
//! order of teardown steps, and [`InMemoryHost::snapshot`] captures the full
//! registry state for equality checks.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
use plexus_kernel::host::{
    CacheScope, Container, DisposableInfo, DisposalTree, ExecutionUnitFactory, ExtensionArea,
    ExtensionPointInfo, HostEnvironment, ListenerCallbacks, MessageBus, ServiceHost, Workspace,
};
use plexus_kernel::{
    ContainerScope, ExecutionUnit, ExtensionDecl, ExtensionPointDecl, ListenerDecl, ModuleDescriptor,
    ModuleId, ServiceDecl, UnitInstanceId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared, ordered record of registry mutations.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Container state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointListener {
    pub name: String,
    pub priority: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointState {
    pub dynamic: bool,
    pub declared_by: Option<ModuleId>,
    /// (owner, implementation)
    pub extensions: Vec<(ModuleId, String)>,
    pub listeners: Vec<PointListener>,
    pub resets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerState {
    pub points: BTreeMap<String, PointState>,
    /// interface -> (owner, implementation)
    pub services: BTreeMap<String, (ModuleId, String)>,
    pub listeners: Vec<(ModuleId, ListenerDecl)>,
    pub disposables: Vec<DisposableInfo>,
    /// (unit, topic)
    pub connections: Vec<(UnitInstanceId, String)>,
}

/// 内存容器
/// One application, workspace or unit container
#[derive(Debug)]
pub struct InMemoryContainer {
    name: String,
    scope: ContainerScope,
    state: Mutex<ContainerState>,
    trace: Trace,
}

impl InMemoryContainer {
    pub fn new(name: &str, scope: ContainerScope, trace: Trace) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            scope,
            state: Mutex::new(ContainerState::default()),
            trace,
        })
    }

    /// Declare an extension point owned by the host itself.
    pub fn declare_point(&self, name: &str, dynamic: bool) {
        self.state.lock().points.insert(
            name.to_string(),
            PointState {
                dynamic,
                declared_by: None,
                extensions: Vec::new(),
                listeners: Vec::new(),
                resets: 0,
            },
        );
    }

    /// Attach a listener notified whenever contributions to `point` are removed.
    pub fn add_point_listener(&self, point: &str, listener: &str, priority: bool) {
        if let Some(state) = self.state.lock().points.get_mut(point) {
            state.listeners.push(PointListener {
                name: listener.to_string(),
                priority,
            });
        }
    }

    pub fn add_disposable(&self, name: &str, owner_unit: Option<UnitInstanceId>) {
        self.state.lock().disposables.push(DisposableInfo {
            name: name.to_string(),
            owner_unit,
        });
    }

    pub fn connect(&self, unit: UnitInstanceId, topic: &str) {
        self.state.lock().connections.push((unit, topic.to_string()));
    }

    pub fn extensions(&self, point: &str) -> Vec<(ModuleId, String)> {
        self.state
            .lock()
            .points
            .get(point)
            .map(|p| p.extensions.clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> ContainerState {
        self.state.lock().clone()
    }

    fn record(&self, entry: String) {
        debug!(container = %self.name, "{}", entry);
        self.trace.push(format!("{}: {}", self.name, entry));
    }

    fn queue_notifications(&self, point: &str, listeners: Vec<PointListener>, callbacks: &mut ListenerCallbacks) {
        for listener in listeners {
            let trace = self.trace.clone();
            let entry = format!("{}: notify {} of {point}", self.name, listener.name);
            let callback = Box::new(move || trace.push(entry));
            if listener.priority {
                callbacks.push_priority(callback);
            } else {
                callbacks.push(callback);
            }
        }
    }

    fn rejected(&self, reason: String) -> LifecycleResult<()> {
        Err(LifecycleError::Container {
            container: self.name.clone(),
            reason,
        })
        .into_report()
    }
}

impl ExtensionArea for InMemoryContainer {
    fn extension_point(&self, name: &str) -> Option<ExtensionPointInfo> {
        self.state.lock().points.get(name).map(|p| ExtensionPointInfo {
            name: name.to_string(),
            dynamic: p.dynamic,
            declared_by: p.declared_by.clone(),
        })
    }

    fn register_extension_point(&self, point: &ExtensionPointDecl, owner: &ModuleId) -> LifecycleResult<()> {
        {
            let mut state = self.state.lock();
            if state.points.contains_key(&point.name) {
                drop(state);
                return self.rejected(format!("extension point {} already registered", point.name));
            }
            state.points.insert(
                point.name.clone(),
                PointState {
                    dynamic: point.dynamic,
                    declared_by: Some(owner.clone()),
                    extensions: Vec::new(),
                    listeners: Vec::new(),
                    resets: 0,
                },
            );
        }
        self.record(format!("register point {} ({owner})", point.name));
        Ok(())
    }

    fn register_extension(
        &self,
        point: &str,
        extension: &ExtensionDecl,
        owner: &ModuleId,
        callbacks: &mut ListenerCallbacks,
    ) -> LifecycleResult<bool> {
        let listeners = {
            let mut state = self.state.lock();
            let Some(entry) = state.points.get_mut(point) else {
                return Ok(false);
            };
            entry
                .extensions
                .push((owner.clone(), extension.implementation.clone()));
            entry.listeners.clone()
        };
        self.record(format!("register {point} <- {} ({owner})", extension.implementation));
        self.queue_notifications(point, listeners, callbacks);
        Ok(true)
    }

    fn unregister_extensions(
        &self,
        point: &str,
        owner: &ModuleId,
        callbacks: &mut ListenerCallbacks,
    ) -> LifecycleResult<bool> {
        let (removed, listeners) = {
            let mut state = self.state.lock();
            let Some(entry) = state.points.get_mut(point) else {
                return Ok(false);
            };
            let before = entry.extensions.len();
            entry.extensions.retain(|(o, _)| o != owner);
            (before - entry.extensions.len(), entry.listeners.clone())
        };

        if removed > 0 {
            self.record(format!("unregister {point} ({owner})"));
            self.queue_notifications(point, listeners, callbacks);
        }
        Ok(true)
    }

    fn reset_extension_points(&self, names: &[String]) {
        let mut reset = Vec::new();
        {
            let mut state = self.state.lock();
            for name in names {
                if let Some(entry) = state.points.get_mut(name) {
                    entry.resets += 1;
                    reset.push(name.clone());
                }
            }
        }
        for name in reset {
            self.record(format!("reset point {name}"));
        }
    }

    fn unregister_extension_points(&self, names: &[String], owner: &ModuleId) -> LifecycleResult<()> {
        let mut removed = Vec::new();
        {
            let mut state = self.state.lock();
            for name in names {
                let owned = state
                    .points
                    .get(name)
                    .is_some_and(|p| p.declared_by.as_ref() == Some(owner));
                if owned {
                    state.points.remove(name);
                    removed.push(name.clone());
                }
            }
        }
        for name in removed {
            self.record(format!("unregister point {name} ({owner})"));
        }
        Ok(())
    }
}

impl ServiceHost for InMemoryContainer {
    fn register_services(&self, owner: &ModuleId, services: &[ServiceDecl]) -> LifecycleResult<()> {
        for service in services {
            self.state.lock().services.insert(
                service.interface.clone(),
                (owner.clone(), service.implementation.clone()),
            );
            self.record(format!("register service {} ({owner})", service.interface));
        }
        Ok(())
    }

    fn unload_services(&self, owner: &ModuleId, services: &[ServiceDecl]) -> LifecycleResult<()> {
        for service in services {
            let removed = {
                let mut state = self.state.lock();
                let owned = state
                    .services
                    .get(&service.interface)
                    .is_some_and(|(o, _)| o == owner);
                owned && state.services.remove(&service.interface).is_some()
            };
            if removed {
                self.record(format!("unload service {} ({owner})", service.interface));
            }
        }
        Ok(())
    }

    fn has_service(&self, interface: &str) -> bool {
        self.state.lock().services.contains_key(interface)
    }
}

impl DisposalTree for InMemoryContainer {
    fn dispose_children(&self, predicate: &dyn Fn(&DisposableInfo) -> bool) -> usize {
        let disposed: Vec<DisposableInfo> = {
            let mut state = self.state.lock();
            let (matching, kept): (Vec<DisposableInfo>, Vec<DisposableInfo>) =
                state.disposables.drain(..).partition(|d| predicate(d));
            state.disposables = kept;
            matching
        };
        for disposable in &disposed {
            self.record(format!("dispose {}", disposable.name));
        }
        disposed.len()
    }
}

impl MessageBus for InMemoryContainer {
    fn subscribe_listeners(&self, owner: &ModuleId, listeners: &[ListenerDecl]) -> LifecycleResult<()> {
        for listener in listeners {
            self.state.lock().listeners.push((owner.clone(), listener.clone()));
            self.record(format!("subscribe {} on {} ({owner})", listener.listener, listener.topic));
        }
        Ok(())
    }

    fn unsubscribe_listeners(&self, owner: &ModuleId, listeners: &[ListenerDecl]) -> LifecycleResult<()> {
        let removed = {
            let mut state = self.state.lock();
            let before = state.listeners.len();
            state
                .listeners
                .retain(|(o, l)| !(o == owner && listeners.contains(l)));
            before - state.listeners.len()
        };
        if removed > 0 {
            self.record(format!("unsubscribe {removed} listener(s) ({owner})"));
        }
        Ok(())
    }

    fn disconnect_owned_by(&self, unit: UnitInstanceId) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let before = state.connections.len();
            state.connections.retain(|(u, _)| *u != unit);
            before - state.connections.len()
        };
        if removed > 0 {
            self.record(format!("disconnect {removed} connection(s)"));
        }
        removed
    }
}

impl Container for InMemoryContainer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn scope(&self) -> ContainerScope {
        self.scope
    }

    fn extension_area(&self) -> &dyn ExtensionArea {
        self
    }

    fn services(&self) -> &dyn ServiceHost {
        self
    }

    fn disposal_tree(&self) -> &dyn DisposalTree {
        self
    }

    fn message_bus(&self) -> &dyn MessageBus {
        self
    }
}

// ============================================================================
// Workspace and host
// ============================================================================

#[derive(Debug)]
pub struct InMemoryWorkspace {
    container: Arc<InMemoryContainer>,
    units: Vec<Arc<InMemoryContainer>>,
}

impl InMemoryWorkspace {
    pub fn container_ref(&self) -> &Arc<InMemoryContainer> {
        &self.container
    }

    pub fn unit_refs(&self) -> &[Arc<InMemoryContainer>] {
        &self.units
    }
}

impl Workspace for InMemoryWorkspace {
    fn container(&self) -> Arc<dyn Container> {
        self.container.clone()
    }

    fn units(&self) -> Vec<Arc<dyn Container>> {
        self.units
            .iter()
            .map(|u| u.clone() as Arc<dyn Container>)
            .collect()
    }
}

/// Full registry state of a host, comparable with `==`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub containers: Vec<(String, ContainerState)>,
}

/// 内存宿主
/// In-memory host environment
#[derive(Debug)]
pub struct InMemoryHost {
    application: Arc<InMemoryContainer>,
    workspaces: RwLock<Vec<Arc<InMemoryWorkspace>>>,
    trace: Trace,
    restart_required: AtomicBool,
    flushes: AtomicUsize,
    cache_clears: Mutex<Vec<CacheScope>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        let trace = Trace::default();
        Self {
            application: InMemoryContainer::new("application", ContainerScope::Application, trace.clone()),
            workspaces: RwLock::new(Vec::new()),
            trace,
            restart_required: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
            cache_clears: Mutex::new(Vec::new()),
        }
    }

    /// Open a workspace with the given unit names.
    pub fn open_workspace(&self, name: &str, units: &[&str]) -> Arc<InMemoryWorkspace> {
        let workspace = Arc::new(InMemoryWorkspace {
            container: InMemoryContainer::new(name, ContainerScope::Workspace, self.trace.clone()),
            units: units
                .iter()
                .map(|u| InMemoryContainer::new(&format!("{name}/{u}"), ContainerScope::Unit, self.trace.clone()))
                .collect(),
        });
        self.workspaces.write().push(Arc::clone(&workspace));
        workspace
    }

    pub fn app(&self) -> &Arc<InMemoryContainer> {
        &self.application
    }

    pub fn workspace_refs(&self) -> Vec<Arc<InMemoryWorkspace>> {
        self.workspaces.read().clone()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn set_requires_restart(&self, value: bool) {
        self.restart_required.store(value, Ordering::SeqCst);
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn cache_clears(&self) -> Vec<CacheScope> {
        self.cache_clears.lock().clone()
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let mut containers = vec![(self.application.name(), self.application.state())];
        for workspace in self.workspaces.read().iter() {
            containers.push((workspace.container.name(), workspace.container.state()));
            for unit in &workspace.units {
                containers.push((unit.name(), unit.state()));
            }
        }
        HostSnapshot { containers }
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment for InMemoryHost {
    fn application(&self) -> Arc<dyn Container> {
        self.application.clone()
    }

    fn workspaces(&self) -> Vec<Arc<dyn Workspace>> {
        self.workspaces
            .read()
            .iter()
            .map(|w| w.clone() as Arc<dyn Workspace>)
            .collect()
    }

    fn flush_event_queue(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn clear_caches(&self, scope: CacheScope) {
        self.cache_clears.lock().push(scope);
    }

    fn requires_restart(&self) -> bool {
        self.restart_required.load(Ordering::SeqCst)
    }
}

/// Creates units without payload or tasks.
#[derive(Debug, Default)]
pub struct EmptyUnitFactory;

#[async_trait]
impl ExecutionUnitFactory for EmptyUnitFactory {
    async fn create(&self, descriptor: &ModuleDescriptor) -> LifecycleResult<Arc<ExecutionUnit>> {
        Ok(ExecutionUnit::empty(descriptor.id.clone()))
    }
}
