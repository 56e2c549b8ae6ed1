//! Can a module be loaded or unloaded without restarting the host?
//!
//! [`UnloadSafety::check`] is a pure predicate over a [`SafetyContext`]. It
//! reads the module set, the live extension registries, the zombie registry
//! and configuration, and never mutates anything. Checks run in a fixed order
//! and the first failure wins.

use plexus_kernel::host::{all_containers, HostEnvironment};
use plexus_kernel::{ContainerScope, ModuleDescriptor, ModuleId, ModuleSet};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::DynamicModulesConfig;
use crate::zombie::ZombieRegistry;

/// Reason a module cannot be handled dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct UnloadBlocked {
    pub module: ModuleId,
    pub reason: String,
}

/// Everything the evaluator may look at.
#[derive(Clone, Copy)]
pub struct SafetyContext<'a> {
    /// Live module set.
    pub set: &'a ModuleSet,
    /// Modules loaded or unloaded together with the one being checked.
    pub batch: &'a [Arc<ModuleDescriptor>],
    pub host: &'a dyn HostEnvironment,
    pub zombies: &'a ZombieRegistry,
    pub config: &'a DynamicModulesConfig,
    /// A restart is already pending.
    pub restart_required: bool,
}

pub struct UnloadSafety;

impl UnloadSafety {
    pub fn check(module: &ModuleDescriptor, cx: &SafetyContext<'_>) -> Result<(), UnloadBlocked> {
        Checker { cx }
            .check(module, None, false, true, cx.batch)
            .map_err(|reason| UnloadBlocked {
                module: module.id.clone(),
                reason,
            })
    }

    /// Check every batch member, returning the first failure.
    pub fn check_all(cx: &SafetyContext<'_>) -> Result<(), UnloadBlocked> {
        Self::check_batch(cx, true)
    }

    /// Like [`check_all`](Self::check_all), optionally skipping implementation-detail dependents.
    pub fn check_batch(cx: &SafetyContext<'_>, check_implementation_details: bool) -> Result<(), UnloadBlocked> {
        let checker = Checker { cx };
        cx.batch.iter().try_for_each(|module| {
            checker
                .check(module, None, false, check_implementation_details, cx.batch)
                .map_err(|reason| UnloadBlocked {
                    module: module.id.clone(),
                    reason,
                })
        })
    }

    /// Whether `module` could be handled even with `allow_unload` disabled.
    pub fn allows_synchronous(module: &ModuleDescriptor, config: &DynamicModulesConfig) -> bool {
        let extensions_ok = module
            .contributed_extension_points()
            .iter()
            .all(|point| config.synchronous_extension_points.iter().any(|p| p == point));
        extensions_ok && static_registration(module).is_none()
    }
}

/// Where a contributed point was found.
struct Resolved {
    dynamic: bool,
    /// Declared by a dependency rather than the module (or its base) itself.
    in_dependencies: bool,
}

struct Checker<'c, 'a> {
    cx: &'c SafetyContext<'a>,
}

impl<'a> Checker<'_, 'a> {
    fn check(
        &self,
        descriptor: &ModuleDescriptor,
        base: Option<&ModuleDescriptor>,
        nested: bool,
        check_implementation_details: bool,
        batch: &[Arc<ModuleDescriptor>],
    ) -> Result<(), String> {
        let id = &descriptor.id;

        if descriptor.requires_restart {
            return Err(format!("Module {id} is explicitly marked as requiring restart"));
        }
        if self.cx.restart_required || self.cx.host.requires_restart() {
            return Err("Host restart is already required".to_string());
        }
        if self.cx.zombies.is_zombie(id) {
            return Err(format!(
                "Not allowing load/unload of {id} because of incomplete previous unload operation for that module"
            ));
        }
        if let Some(missing) = self.missing_required_dependency(descriptor, batch) {
            return Err(format!(
                "Required dependency {missing} of module {id} is not currently loaded"
            ));
        }
        if !self.cx.config.allow_unload {
            if UnloadSafety::allows_synchronous(descriptor, self.cx.config) {
                return Ok(());
            }
            return Err(format!(
                "allow_unload is disabled and synchronous load/unload is not possible for {id}"
            ));
        }
        if let Some(reason) = static_registration(descriptor) {
            return Err(format!("Module {id} is not unload-safe because it {reason}"));
        }
        self.check_extensions(descriptor, base, batch)?;

        let root = base.unwrap_or(descriptor);
        for dependency in &descriptor.dependencies {
            let Some(sub) = &dependency.sub_descriptor else {
                continue;
            };
            if self.is_loaded_or_in_batch(&dependency.target, batch) {
                self.check(sub, Some(root), true, true, batch)
                    .map_err(|r| format!("{r} in optional dependency on {}", dependency.target))?;
            }
        }
        if base.is_none() {
            for content in &descriptor.content_modules {
                self.check(content, None, true, true, batch)
                    .map_err(|r| format!("{r} in content module {}", content.id))?;
            }
        }

        if nested {
            return Ok(());
        }

        for contribution in self.cx.set.loaded_optional_dependents(id) {
            let dependent = &contribution.dependent;
            self.check(&contribution.sub, Some(dependent.as_ref()), true, true, batch).map_err(|r| {
                format!(
                    "Module {} that optionally depends on {id} requires restart: {r}",
                    dependent.id
                )
            })?;
        }

        if check_implementation_details {
            self.check_implementation_details(descriptor, batch)?;
        }
        Ok(())
    }

    fn check_implementation_details(
        &self,
        descriptor: &ModuleDescriptor,
        batch: &[Arc<ModuleDescriptor>],
    ) -> Result<(), String> {
        let dependents = self.cx.set.implementation_detail_dependents(&descriptor.id);
        if dependents.is_empty() {
            return Ok(());
        }

        let mut extended: Vec<Arc<ModuleDescriptor>> = batch.to_vec();
        if !extended.iter().any(|d| d.id == descriptor.id) {
            let shared = self
                .cx
                .set
                .get(&descriptor.id)
                .cloned()
                .unwrap_or_else(|| Arc::new(descriptor.clone()));
            extended.push(shared);
        }
        for dependent in &dependents {
            if !extended.iter().any(|d| d.id == dependent.id) {
                extended.push(Arc::clone(dependent));
            }
        }

        for dependent in &dependents {
            // would not be loaded anyway
            if self.missing_required_dependency(dependent, &extended).is_some() {
                continue;
            }
            self.check(dependent, None, false, false, &extended).map_err(|r| {
                format!(
                    "implementation-detail module {} which depends on {} requires restart: {r}",
                    dependent.id, descriptor.id
                )
            })?;
        }
        Ok(())
    }

    fn check_extensions(
        &self,
        descriptor: &ModuleDescriptor,
        base: Option<&ModuleDescriptor>,
        batch: &[Arc<ModuleDescriptor>],
    ) -> Result<(), String> {
        let id = &descriptor.id;
        let root = base.unwrap_or(descriptor);

        for point in descriptor.contributed_extension_points() {
            if let Some(resolved) = self.resolve_declared(root, point, batch) {
                // A module may extend its own points (directly or from a
                // sub-descriptor) regardless of whether they are dynamic.
                if resolved.dynamic || !resolved.in_dependencies {
                    continue;
                }
                return Err(non_dynamic(id, point));
            }

            if let Some(dynamic) = self.resolve_live(point) {
                if dynamic {
                    continue;
                }
                return Err(non_dynamic(id, point));
            }

            if let Some(dynamic) = resolve_in_batch(point, batch) {
                if dynamic {
                    continue;
                }
                return Err(non_dynamic(id, point));
            }

            if self.cx.config.is_allow_listed(point, id.as_str()) {
                continue;
            }

            return Err(format!(
                "Module {id} is not unload-safe because of unresolved extension {point}"
            ));
        }
        Ok(())
    }

    /// Search `root`, its active sub-descriptors and its loaded dependencies.
    fn resolve_declared(
        &self,
        root: &ModuleDescriptor,
        point: &str,
        batch: &[Arc<ModuleDescriptor>],
    ) -> Option<Resolved> {
        let mut visited: HashSet<*const ModuleDescriptor> = HashSet::new();
        let mut stack: Vec<(&ModuleDescriptor, bool)> = vec![(root, false)];

        while let Some((descriptor, in_dependencies)) = stack.pop() {
            if !visited.insert(std::ptr::from_ref(descriptor)) {
                continue;
            }
            if let Some((_, declared)) = descriptor.find_extension_point(point) {
                return Some(Resolved {
                    dynamic: declared.dynamic,
                    in_dependencies,
                });
            }

            let mut next: Vec<(&ModuleDescriptor, bool)> = Vec::new();
            for dependency in &descriptor.dependencies {
                if !self.is_loaded_or_in_batch(&dependency.target, batch) {
                    continue;
                }
                if let Some(sub) = &dependency.sub_descriptor {
                    next.push((sub.as_ref(), in_dependencies));
                }
                if let Some(target) = lookup(self.cx.set, &dependency.target, batch) {
                    next.push((target, true));
                }
            }
            stack.extend(next.into_iter().rev());
        }
        None
    }

    /// Application, then workspaces, then units.
    fn resolve_live(&self, point: &str) -> Option<bool> {
        all_containers(self.cx.host)
            .iter()
            .find_map(|container| container.extension_area().extension_point(point))
            .map(|info| info.dynamic)
    }

    fn missing_required_dependency<'d>(
        &self,
        descriptor: &'d ModuleDescriptor,
        batch: &[Arc<ModuleDescriptor>],
    ) -> Option<&'d ModuleId> {
        descriptor
            .required_dependencies()
            .map(|d| &d.target)
            .find(|target| !self.is_loaded_or_in_batch(target, batch))
    }

    fn is_loaded_or_in_batch(&self, id: &ModuleId, batch: &[Arc<ModuleDescriptor>]) -> bool {
        self.cx.set.is_enabled(id) || in_batch(id, batch)
    }
}

fn in_batch(id: &ModuleId, batch: &[Arc<ModuleDescriptor>]) -> bool {
    batch
        .iter()
        .any(|d| &d.id == id || d.content_modules.iter().any(|c| &c.id == id))
}

fn lookup<'x>(set: &'x ModuleSet, id: &ModuleId, batch: &'x [Arc<ModuleDescriptor>]) -> Option<&'x ModuleDescriptor> {
    batch
        .iter()
        .find_map(|d| {
            if &d.id == id {
                Some(d.as_ref())
            } else {
                d.content_modules.iter().find(|c| &c.id == id).map(|c| c.as_ref())
            }
        })
        .or_else(|| set.get(id).map(|d| d.as_ref()))
}

fn resolve_in_batch(point: &str, batch: &[Arc<ModuleDescriptor>]) -> Option<bool> {
    batch
        .iter()
        .flat_map(|d| std::iter::once(d).chain(d.content_modules.iter()))
        .find_map(|d| d.find_extension_point(point))
        .map(|(_, declared)| declared.dynamic)
}

/// Registrations that have no unregistration counterpart.
fn static_registration(descriptor: &ModuleDescriptor) -> Option<&'static str> {
    for scope in ContainerScope::ALL {
        let container = descriptor.container(scope);
        if !container.components.is_empty() {
            return Some("declares components");
        }
        if container.services.iter().any(|s| s.overrides) {
            return Some("overrides services");
        }
    }
    None
}

fn non_dynamic(id: &ModuleId, point: &str) -> String {
    format!("Module {id} is not unload-safe because of extension to non-dynamic extension point {point}")
}
