//! Module metadata, immutable module sets and the dependency graph between them.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

pub mod descriptor;
pub mod graph;
pub mod set;

pub use descriptor::{
    ContainerDescriptor, ContainerScope, ExtensionDecl, ExtensionPointDecl, ListenerDecl,
    ModuleDependency, ModuleDescriptor, ServiceDecl,
};
pub use graph::{DependencyGraph, Direction, Edge, TopologicalOrder};
pub use set::{ModuleSet, ModuleSetState, OptionalContribution};

/// 模块唯一标识
/// Globally unique module identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
