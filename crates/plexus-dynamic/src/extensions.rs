//! Installing and removing a module's contributions in every live container.
//!
//! [`ExtensionWiring::unregister`] is the teardown half: it removes exactly the
//! contributions a module owns, collecting listener notifications until every
//! removal is done, then drops the module's declared extension points,
//! services, listeners and unit-owned resources. [`ExtensionWiring::register`]
//! is the load-side counterpart.
//!
//! Contributions are keyed by an owner id. Main descriptors and content
//! modules use their own id; a sub-descriptor uses
//! [`sub_descriptor_owner`] so it can be removed without touching the
//! contributions of the module that declares it.

use error_stack::Report;
use plexus_kernel::error::{LifecycleError, LifecycleResult};
use plexus_kernel::host::{
    all_containers, containers_of_scope, CacheScope, Container, HostEnvironment, ListenerCallbacks,
};
use plexus_kernel::{ContainerScope, ExecutionUnit, ModuleDescriptor, ModuleId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Owner key of the sub-descriptor `main` declares for its optional dependency on `target`.
pub fn sub_descriptor_owner(main: &ModuleId, target: &ModuleId) -> ModuleId {
    ModuleId::new(format!("{main}:{target}"))
}

/// Keeps the first failure and logs the rest.
#[derive(Default)]
struct Failures {
    first: Option<Report<LifecycleError>>,
}

impl Failures {
    fn record<T>(&mut self, owner: &ModuleId, result: LifecycleResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(report) => {
                if self.first.is_none() {
                    self.first = Some(report);
                } else {
                    warn!(module = %owner, "Additional wiring failure: {:?}", report);
                }
                None
            }
        }
    }

    fn finish(self) -> LifecycleResult<()> {
        match self.first {
            Some(report) => Err(report),
            None => Ok(()),
        }
    }
}

/// 扩展注册编排
/// Registers and unregisters module contributions against a host
pub struct ExtensionWiring;

impl ExtensionWiring {
    /// Install everything `descriptor` contributes.
    ///
    /// Extension points go first so extensions of the same module can land on
    /// them. Listener notifications are queued on `callbacks` for the caller to
    /// run once the whole batch is wired.
    pub fn register(
        descriptor: &ModuleDescriptor,
        owner: &ModuleId,
        host: &dyn HostEnvironment,
        callbacks: &mut ListenerCallbacks,
    ) -> LifecycleResult<()> {
        let mut failures = Failures::default();

        for scope in ContainerScope::ALL {
            let declared = descriptor.container(scope);
            if declared.extension_points.is_empty() {
                continue;
            }
            for container in containers_of_scope(host, scope) {
                for point in &declared.extension_points {
                    failures.record(owner, container.extension_area().register_extension_point(point, owner));
                }
            }
        }

        for scope in ContainerScope::ALL {
            let containers = containers_of_scope(host, scope);
            for (point, extensions) in &descriptor.container(scope).extensions {
                for container in &containers {
                    for extension in extensions {
                        let found = failures.record(
                            owner,
                            container
                                .extension_area()
                                .register_extension(point, extension, owner, callbacks),
                        );
                        if found == Some(false) {
                            debug!(module = %owner, point = %point, container = %container.name(), "Point not present in container");
                        }
                    }
                }
            }
        }

        for (point, extensions) in &descriptor.unscoped_extensions {
            let targets = resolve_unscoped(host, point);
            if targets.is_empty() {
                warn!(module = %owner, point = %point, "No container declares extension point");
                continue;
            }
            for container in &targets {
                for extension in extensions {
                    failures.record(
                        owner,
                        container
                            .extension_area()
                            .register_extension(point, extension, owner, callbacks),
                    );
                }
            }
        }

        for scope in ContainerScope::ALL {
            let declared = descriptor.container(scope);
            if declared.services.is_empty() && declared.listeners.is_empty() {
                continue;
            }
            for container in containers_of_scope(host, scope) {
                if !declared.services.is_empty() {
                    failures.record(owner, container.services().register_services(owner, &declared.services));
                }
                if !declared.listeners.is_empty() {
                    failures.record(
                        owner,
                        container.message_bus().subscribe_listeners(owner, &declared.listeners),
                    );
                }
            }
        }

        debug!(module = %owner, "Contributions registered");
        failures.finish()
    }

    /// Remove everything `descriptor` contributed under `owner`.
    ///
    /// Every step runs even when an earlier one fails; the first failure is
    /// returned and the others are logged. With `unit` set, disposal-tree nodes
    /// and message-bus connections created by that unit are released too.
    pub fn unregister(
        descriptor: &ModuleDescriptor,
        owner: &ModuleId,
        unit: Option<&ExecutionUnit>,
        host: &dyn HostEnvironment,
        clear_extension_points: bool,
    ) -> LifecycleResult<()> {
        let mut failures = Failures::default();
        let mut callbacks = ListenerCallbacks::new();

        for scope in ContainerScope::ALL {
            let extensions = &descriptor.container(scope).extensions;
            if extensions.is_empty() {
                continue;
            }
            let containers = containers_of_scope(host, scope);
            for point in extensions.keys() {
                for container in &containers {
                    failures.record(
                        owner,
                        container
                            .extension_area()
                            .unregister_extensions(point, owner, &mut callbacks),
                    );
                }
            }
        }

        for point in descriptor.unscoped_extensions.keys() {
            for container in resolve_unscoped(host, point) {
                failures.record(
                    owner,
                    container
                        .extension_area()
                        .unregister_extensions(point, owner, &mut callbacks),
                );
            }
        }

        if !callbacks.is_empty() {
            debug!(module = %owner, callbacks = callbacks.len(), "Running listener callbacks");
        }
        callbacks.run();

        if clear_extension_points {
            for scope in ContainerScope::ALL {
                let names = descriptor.container(scope).extension_point_names();
                if names.is_empty() {
                    continue;
                }
                let containers = containers_of_scope(host, scope);
                for container in &containers {
                    container.extension_area().reset_extension_points(&names);
                }
                for container in &containers {
                    failures.record(
                        owner,
                        container.extension_area().unregister_extension_points(&names, owner),
                    );
                }
            }
        }

        for scope in ContainerScope::ALL {
            let declared = descriptor.container(scope);
            if declared.services.is_empty() && declared.listeners.is_empty() {
                continue;
            }
            for container in containers_of_scope(host, scope) {
                if !declared.services.is_empty() {
                    failures.record(owner, container.services().unload_services(owner, &declared.services));
                }
                if !declared.listeners.is_empty() {
                    failures.record(
                        owner,
                        container.message_bus().unsubscribe_listeners(owner, &declared.listeners),
                    );
                }
            }
        }

        let containers = all_containers(host);
        if let Some(unit) = unit {
            let unit_id = unit.instance_id();
            let mut disposed = 0;
            let mut disconnected = 0;
            for container in &containers {
                disposed += container
                    .disposal_tree()
                    .dispose_children(&|node| node.owner_unit == Some(unit_id));
                disconnected += container.message_bus().disconnect_owned_by(unit_id);
            }
            debug!(module = %owner, unit = %unit_id, disposed, disconnected, "Unit resources released");
        }

        host.clear_caches(CacheScope::All);
        for container in &containers {
            container.extension_area().clear_user_cache();
        }

        debug!(module = %owner, "Contributions unregistered");
        failures.finish()
    }
}

/// Containers holding `point`: the application if it has it, else every
/// workspace that has it, else every unit that has it.
fn resolve_unscoped(host: &dyn HostEnvironment, point: &str) -> Vec<Arc<dyn Container>> {
    for scope in ContainerScope::ALL {
        let found: Vec<Arc<dyn Container>> = containers_of_scope(host, scope)
            .into_iter()
            .filter(|c| c.extension_area().extension_point(point).is_some())
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
