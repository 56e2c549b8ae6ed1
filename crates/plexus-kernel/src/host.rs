//! Host collaborator traits.
//!
//! The lifecycle engine never owns registries itself. It drives the host
//! through the traits below: one [`Container`] per application, workspace and
//! unit, each exposing an extension area, a service host, a disposal tree and
//! a message bus.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::LifecycleResult;
use crate::module::{
    ContainerScope, ExtensionDecl, ExtensionPointDecl, ListenerDecl, ModuleDescriptor, ModuleId,
    ModuleSetState, ServiceDecl,
};
use crate::unit::{ExecutionUnit, UnitInstanceId};

// ============================================================================
// 监听回调
// ============================================================================

pub type ListenerCallback = Box<dyn FnOnce() + Send>;

/// 监听回调集合
/// Listener notifications collected while contributions change, run once all changes are done
#[derive(Default)]
pub struct ListenerCallbacks {
    priority: Vec<ListenerCallback>,
    ordinary: Vec<ListenerCallback>,
}

impl ListenerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_priority(&mut self, callback: ListenerCallback) {
        self.priority.push(callback);
    }

    pub fn push(&mut self, callback: ListenerCallback) {
        self.ordinary.push(callback);
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.ordinary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run priority callbacks, then ordinary ones.
    pub fn run(self) {
        for callback in self.priority.into_iter().chain(self.ordinary) {
            callback();
        }
    }
}

impl fmt::Debug for ListenerCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerCallbacks")
            .field("priority", &self.priority.len())
            .field("ordinary", &self.ordinary.len())
            .finish()
    }
}

// ============================================================================
// 容器
// ============================================================================

/// Live extension point as seen by a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPointInfo {
    pub name: String,
    pub dynamic: bool,
    /// `None` for points the host declares itself.
    pub declared_by: Option<ModuleId>,
}

/// 扩展区域
/// Extension registry of one container
pub trait ExtensionArea: Send + Sync {
    fn extension_point(&self, name: &str) -> Option<ExtensionPointInfo>;

    fn register_extension_point(&self, point: &ExtensionPointDecl, owner: &ModuleId) -> LifecycleResult<()>;

    /// Returns `false` when the point does not live in this container.
    fn register_extension(
        &self,
        point: &str,
        extension: &ExtensionDecl,
        owner: &ModuleId,
        callbacks: &mut ListenerCallbacks,
    ) -> LifecycleResult<bool>;

    /// Remove every contribution of `owner` to `point`.
    ///
    /// Returns `false` when the point does not live in this container. Listener
    /// notifications are queued on `callbacks` instead of running inline.
    fn unregister_extensions(
        &self,
        point: &str,
        owner: &ModuleId,
        callbacks: &mut ListenerCallbacks,
    ) -> LifecycleResult<bool>;

    /// Drop cached extension instances of the named points.
    fn reset_extension_points(&self, names: &[String]);

    fn unregister_extension_points(&self, names: &[String], owner: &ModuleId) -> LifecycleResult<()>;

    fn clear_user_cache(&self) {}
}

/// 服务宿主
/// Service registrations of one container
pub trait ServiceHost: Send + Sync {
    fn register_services(&self, owner: &ModuleId, services: &[ServiceDecl]) -> LifecycleResult<()>;

    fn unload_services(&self, owner: &ModuleId, services: &[ServiceDecl]) -> LifecycleResult<()>;

    fn has_service(&self, interface: &str) -> bool;
}

/// Node of a disposal tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposableInfo {
    pub name: String,
    pub owner_unit: Option<UnitInstanceId>,
}

pub trait DisposalTree: Send + Sync {
    /// Dispose every node matching `predicate`, returning how many were disposed.
    fn dispose_children(&self, predicate: &dyn Fn(&DisposableInfo) -> bool) -> usize;
}

/// 消息总线
/// Message bus of one container
pub trait MessageBus: Send + Sync {
    fn subscribe_listeners(&self, owner: &ModuleId, listeners: &[ListenerDecl]) -> LifecycleResult<()>;

    fn unsubscribe_listeners(&self, owner: &ModuleId, listeners: &[ListenerDecl]) -> LifecycleResult<()>;

    /// Drop every connection created by code of `unit`.
    fn disconnect_owned_by(&self, unit: UnitInstanceId) -> usize;
}

/// 容器（应用、工作区或单元）
/// A container at application, workspace or unit level
pub trait Container: Send + Sync {
    fn name(&self) -> String;

    fn scope(&self) -> ContainerScope;

    fn extension_area(&self) -> &dyn ExtensionArea;

    fn services(&self) -> &dyn ServiceHost;

    fn disposal_tree(&self) -> &dyn DisposalTree;

    fn message_bus(&self) -> &dyn MessageBus;
}

/// An open workspace and the units inside it.
pub trait Workspace: Send + Sync {
    fn container(&self) -> Arc<dyn Container>;

    fn units(&self) -> Vec<Arc<dyn Container>>;
}

/// Which host caches to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    All,
    /// Caches keyed by the identity of one execution unit.
    Unit(UnitInstanceId),
}

/// 宿主环境
/// The running host process
pub trait HostEnvironment: Send + Sync {
    fn application(&self) -> Arc<dyn Container>;

    fn workspaces(&self) -> Vec<Arc<dyn Workspace>>;

    /// Deliver pending events before teardown starts.
    fn flush_event_queue(&self) {}

    fn clear_caches(&self, scope: CacheScope) {
        let _ = scope;
    }

    /// The host already decided a restart is unavoidable.
    fn requires_restart(&self) -> bool {
        false
    }
}

/// Every live container of `scope`.
pub fn containers_of_scope(host: &dyn HostEnvironment, scope: ContainerScope) -> Vec<Arc<dyn Container>> {
    match scope {
        ContainerScope::Application => vec![host.application()],
        ContainerScope::Workspace => host.workspaces().iter().map(|w| w.container()).collect(),
        ContainerScope::Unit => host.workspaces().iter().flat_map(|w| w.units()).collect(),
    }
}

/// Application, then each workspace, then each unit.
pub fn all_containers(host: &dyn HostEnvironment) -> Vec<Arc<dyn Container>> {
    ContainerScope::ALL
        .iter()
        .flat_map(|scope| containers_of_scope(host, *scope))
        .collect()
}

// ============================================================================
// 生命周期监听
// ============================================================================

/// Refusal raised by a listener before teardown starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct UnloadVeto {
    pub reason: String,
}

impl UnloadVeto {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// 模块生命周期监听器
/// Observer of module loads and unloads
pub trait LifecycleListener: Send + Sync {
    fn before_load(&self, descriptor: &ModuleDescriptor) {
        let _ = descriptor;
    }

    fn loaded(&self, descriptor: &ModuleDescriptor) {
        let _ = descriptor;
    }

    /// Last chance to cancel an unload batch.
    fn before_unload(&self, descriptor: &ModuleDescriptor, is_update: bool) -> Result<(), UnloadVeto> {
        let _ = (descriptor, is_update);
        Ok(())
    }

    /// Teardown of `descriptor` is about to start; it can no longer be cancelled.
    fn unloading(&self, descriptor: &ModuleDescriptor, is_update: bool) {
        let _ = (descriptor, is_update);
    }

    fn unloaded(&self, descriptor: &ModuleDescriptor, is_update: bool) {
        let _ = (descriptor, is_update);
    }
}

// ============================================================================
// 持久化与加载
// ============================================================================

/// 模块状态存储
/// Persists which modules are enabled
#[async_trait]
pub trait ModuleStateStore: Send + Sync {
    async fn save(&self, state: &ModuleSetState) -> LifecycleResult<()>;

    /// `None` when nothing was saved yet.
    async fn load(&self) -> LifecycleResult<Option<ModuleSetState>>;
}

/// Creates the execution unit of a module being loaded.
#[async_trait]
pub trait ExecutionUnitFactory: Send + Sync {
    async fn create(&self, descriptor: &ModuleDescriptor) -> LifecycleResult<Arc<ExecutionUnit>>;
}
