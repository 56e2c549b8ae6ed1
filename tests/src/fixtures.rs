use plexus_dynamic::{DynamicModulesConfig, InMemoryHost, ModuleLifecycleManager};
use plexus_kernel::host::{ExecutionUnitFactory, HostEnvironment};
use plexus_kernel::{ModuleDescriptor, ModuleId, ModuleSet};
use std::sync::Arc;
use std::time::Duration;

use crate::factory::ScriptedUnitFactory;

pub fn id(s: &str) -> ModuleId {
    ModuleId::from(s)
}

/// Short timeouts so leak checks finish quickly.
pub fn quick_config() -> DynamicModulesConfig {
    DynamicModulesConfig::default()
        .with_unload_timeout(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(5))
}

/// A manager together with the host and factory it drives.
pub struct Harness {
    pub host: Arc<InMemoryHost>,
    pub factory: Arc<ScriptedUnitFactory>,
    pub manager: ModuleLifecycleManager,
}

impl Harness {
    pub fn with_config(descriptors: Vec<ModuleDescriptor>, enabled: &[&str], config: DynamicModulesConfig) -> Self {
        let host = Arc::new(InMemoryHost::new());
        let factory = Arc::new(ScriptedUnitFactory::new());
        let shared: Vec<Arc<ModuleDescriptor>> = descriptors.into_iter().map(ModuleDescriptor::into_shared).collect();
        let set = ModuleSet::build(shared, enabled.iter().map(|e| id(e)));
        let manager = ModuleLifecycleManager::new(
            Arc::clone(&host) as Arc<dyn HostEnvironment>,
            Arc::clone(&factory) as Arc<dyn ExecutionUnitFactory>,
            set,
            config,
        );
        Self { host, factory, manager }
    }

    /// Descriptor of a known module.
    pub fn descriptor(&self, module: &str) -> Arc<ModuleDescriptor> {
        match self.manager.snapshot().get(&id(module)) {
            Some(descriptor) => Arc::clone(descriptor),
            None => panic!("module {module} is not part of the set"),
        }
    }
}

/// Harness with every listed module enabled but nothing activated yet.
pub fn harness(descriptors: Vec<ModuleDescriptor>) -> Harness {
    let ids: Vec<String> = descriptors.iter().map(|d| d.id.to_string()).collect();
    let enabled: Vec<&str> = ids.iter().map(String::as_str).collect();
    Harness::with_config(descriptors, &enabled, quick_config())
}
