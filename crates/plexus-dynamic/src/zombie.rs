//! Units of unloaded modules that were not collected yet.

use parking_lot::Mutex;
use plexus_kernel::{ExecutionUnit, ModuleId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Weak-value map from module id to the unit left behind by its last unload.
///
/// An entry only counts while its unit is still alive; dead entries are pruned
/// on access.
#[derive(Debug, Default)]
pub struct ZombieRegistry {
    entries: Mutex<HashMap<ModuleId, Weak<ExecutionUnit>>>,
}

impl ZombieRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: ModuleId, unit: Weak<ExecutionUnit>) {
        self.entries.lock().insert(id, unit);
    }

    pub fn is_zombie(&self, id: &ModuleId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(weak) if weak.strong_count() > 0 => true,
            Some(_) => {
                debug!(module = %id, "Zombie unit collected");
                entries.remove(id);
                false
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<ExecutionUnit>> {
        self.entries.lock().get(id).and_then(Weak::upgrade)
    }

    pub fn remove(&self, id: &ModuleId) {
        self.entries.lock().remove(id);
    }

    /// Ids whose units are still alive, sorted.
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut entries = self.entries.lock();
        entries.retain(|_, weak| weak.strong_count() > 0);
        let mut ids: Vec<ModuleId> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
