//! Immutable module metadata.
//!
//! A [`ModuleDescriptor`] is built once through its `with_*` builder methods and
//! then shared as `Arc<ModuleDescriptor>`. Nothing mutates a descriptor after it
//! has been handed to a [`ModuleSet`](super::ModuleSet); an update always builds
//! a new instance.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::ModuleId;

// ============================================================================
// 容器作用域
// ============================================================================

/// 容器作用域
/// Container scope a contribution is registered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerScope {
    /// 应用级容器（全局唯一）
    /// Application-level container (one per host)
    Application,
    /// 工作区级容器
    /// One container per open workspace
    Workspace,
    /// 单元级容器（工作区内）
    /// One container per unit inside a workspace
    Unit,
}

impl ContainerScope {
    pub const ALL: [ContainerScope; 3] = [
        ContainerScope::Application,
        ContainerScope::Workspace,
        ContainerScope::Unit,
    ];
}

impl fmt::Display for ContainerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerScope::Application => write!(f, "application"),
            ContainerScope::Workspace => write!(f, "workspace"),
            ContainerScope::Unit => write!(f, "unit"),
        }
    }
}

// ============================================================================
// 贡献声明
// ============================================================================

/// A single implementation contributed to an extension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDecl {
    pub implementation: String,
}

impl ExtensionDecl {
    pub fn new(implementation: &str) -> Self {
        Self {
            implementation: implementation.to_string(),
        }
    }
}

/// An extension point declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionPointDecl {
    pub name: String,
    /// Whether contributions may be unregistered at runtime.
    pub dynamic: bool,
}

/// A service registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDecl {
    pub interface: String,
    pub implementation: String,
    /// Replaces a service registered by another module. Has no unregistration counterpart.
    pub overrides: bool,
}

impl ServiceDecl {
    pub fn new(interface: &str, implementation: &str) -> Self {
        Self {
            interface: interface.to_string(),
            implementation: implementation.to_string(),
            overrides: false,
        }
    }

    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }
}

/// A lazily subscribed message-bus listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerDecl {
    pub topic: String,
    pub listener: String,
}

/// Everything a module registers into containers of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// Extension point name -> contributed implementations
    pub extensions: BTreeMap<String, Vec<ExtensionDecl>>,
    pub extension_points: Vec<ExtensionPointDecl>,
    pub services: Vec<ServiceDecl>,
    pub listeners: Vec<ListenerDecl>,
    /// Statically registered components. Cannot be unregistered.
    pub components: Vec<String>,
}

impl ContainerDescriptor {
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && self.extension_points.is_empty()
            && self.services.is_empty()
            && self.listeners.is_empty()
            && self.components.is_empty()
    }

    pub fn extension_point(&self, name: &str) -> Option<&ExtensionPointDecl> {
        self.extension_points.iter().find(|ep| ep.name == name)
    }

    pub fn extension_point_names(&self) -> Vec<String> {
        self.extension_points.iter().map(|ep| ep.name.clone()).collect()
    }
}

// ============================================================================
// 依赖声明
// ============================================================================

/// 模块依赖
/// Dependency of a module on another module (or content module)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub target: ModuleId,
    pub optional: bool,
    /// Contributions that are only active while `target` is loaded.
    pub sub_descriptor: Option<Arc<ModuleDescriptor>>,
}

// ============================================================================
// 模块描述
// ============================================================================

/// 模块描述（不可变）
/// Immutable module descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub name: String,
    pub version: String,
    pub dependencies: Vec<ModuleDependency>,
    /// Sub-modules sharing this module's lifecycle, each with its own extension namespace.
    pub content_modules: Vec<Arc<ModuleDescriptor>>,
    pub application: ContainerDescriptor,
    pub workspace: ContainerDescriptor,
    pub unit: ContainerDescriptor,
    /// Extensions whose scope is resolved by probing application, workspaces, then units.
    pub unscoped_extensions: BTreeMap<String, Vec<ExtensionDecl>>,
    pub requires_restart: bool,
    /// The module only exists to extend another module.
    pub implementation_detail: bool,
    pub bundled: bool,
}

impl ModuleDescriptor {
    pub fn new(id: &str) -> Self {
        Self {
            id: ModuleId::from(id),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
            content_modules: Vec::new(),
            application: ContainerDescriptor::default(),
            workspace: ContainerDescriptor::default(),
            unit: ContainerDescriptor::default(),
            unscoped_extensions: BTreeMap::new(),
            requires_restart: false,
            implementation_detail: false,
            bundled: false,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_dependency(mut self, target: &str) -> Self {
        self.dependencies.push(ModuleDependency {
            target: ModuleId::from(target),
            optional: false,
            sub_descriptor: None,
        });
        self
    }

    pub fn with_optional_dependency(mut self, target: &str) -> Self {
        self.dependencies.push(ModuleDependency {
            target: ModuleId::from(target),
            optional: true,
            sub_descriptor: None,
        });
        self
    }

    /// Add an optional dependency whose contributions live in `sub`.
    ///
    /// The sub-descriptor takes this module's id; contributions it declares are
    /// registered only while `target` is loaded.
    pub fn with_optional_dependency_descriptor(mut self, target: &str, mut sub: ModuleDescriptor) -> Self {
        sub.id = self.id.clone();
        sub.name = self.name.clone();
        self.dependencies.push(ModuleDependency {
            target: ModuleId::from(target),
            optional: true,
            sub_descriptor: Some(Arc::new(sub)),
        });
        self
    }

    pub fn with_content_module(mut self, module: ModuleDescriptor) -> Self {
        self.content_modules.push(Arc::new(module));
        self
    }

    pub fn with_extension(mut self, scope: ContainerScope, point: &str, implementation: &str) -> Self {
        self.container_mut(scope)
            .extensions
            .entry(point.to_string())
            .or_default()
            .push(ExtensionDecl::new(implementation));
        self
    }

    pub fn with_unscoped_extension(mut self, point: &str, implementation: &str) -> Self {
        self.unscoped_extensions
            .entry(point.to_string())
            .or_default()
            .push(ExtensionDecl::new(implementation));
        self
    }

    pub fn with_extension_point(mut self, scope: ContainerScope, name: &str, dynamic: bool) -> Self {
        self.container_mut(scope).extension_points.push(ExtensionPointDecl {
            name: name.to_string(),
            dynamic,
        });
        self
    }

    pub fn with_service(mut self, scope: ContainerScope, service: ServiceDecl) -> Self {
        self.container_mut(scope).services.push(service);
        self
    }

    pub fn with_listener(mut self, scope: ContainerScope, topic: &str, listener: &str) -> Self {
        self.container_mut(scope).listeners.push(ListenerDecl {
            topic: topic.to_string(),
            listener: listener.to_string(),
        });
        self
    }

    pub fn with_component(mut self, scope: ContainerScope, component: &str) -> Self {
        self.container_mut(scope).components.push(component.to_string());
        self
    }

    pub fn requiring_restart(mut self) -> Self {
        self.requires_restart = true;
        self
    }

    pub fn as_implementation_detail(mut self) -> Self {
        self.implementation_detail = true;
        self
    }

    pub fn as_bundled(mut self) -> Self {
        self.bundled = true;
        self
    }

    /// Freeze the descriptor.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn container_mut(&mut self, scope: ContainerScope) -> &mut ContainerDescriptor {
        match scope {
            ContainerScope::Application => &mut self.application,
            ContainerScope::Workspace => &mut self.workspace,
            ContainerScope::Unit => &mut self.unit,
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn container(&self, scope: ContainerScope) -> &ContainerDescriptor {
        match scope {
            ContainerScope::Application => &self.application,
            ContainerScope::Workspace => &self.workspace,
            ContainerScope::Unit => &self.unit,
        }
    }

    /// Every extension point name this module contributes to, across all scopes.
    pub fn contributed_extension_points(&self) -> BTreeSet<&str> {
        self.unscoped_extensions
            .keys()
            .chain(ContainerScope::ALL.iter().flat_map(|s| self.container(*s).extensions.keys()))
            .map(String::as_str)
            .collect()
    }

    /// Find an extension point declared by this descriptor (not its sub-descriptors).
    pub fn find_extension_point(&self, name: &str) -> Option<(ContainerScope, &ExtensionPointDecl)> {
        ContainerScope::ALL
            .iter()
            .find_map(|scope| self.container(*scope).extension_point(name).map(|ep| (*scope, ep)))
    }

    pub fn declares_extension_points(&self) -> bool {
        ContainerScope::ALL
            .iter()
            .any(|scope| !self.container(*scope).extension_points.is_empty())
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &ModuleDependency> {
        self.dependencies.iter().filter(|d| !d.optional)
    }

    pub fn optional_dependencies(&self) -> impl Iterator<Item = &ModuleDependency> {
        self.dependencies.iter().filter(|d| d.optional)
    }

    pub fn depends_on(&self, target: &ModuleId) -> bool {
        self.dependencies.iter().any(|d| &d.target == target)
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.version)
    }
}
