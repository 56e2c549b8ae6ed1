use parking_lot::Mutex;
use plexus_kernel::host::{LifecycleListener, UnloadVeto};
use plexus_kernel::ModuleDescriptor;

/// Records every lifecycle callback as `"<callback> <module>"`.
///
/// Unload callbacks made for an update carry a `" (update)"` suffix.
#[derive(Debug, Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<String>>,
    /// Module whose unload is refused, with the reason.
    veto: Option<(String, String)>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vetoing(module: &str, reason: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            veto: Some((module.to_string(), reason.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, callback: &str, descriptor: &ModuleDescriptor) {
        self.calls.lock().push(format!("{callback} {}", descriptor.id));
    }

    fn record_unload(&self, callback: &str, descriptor: &ModuleDescriptor, is_update: bool) {
        let suffix = if is_update { " (update)" } else { "" };
        self.calls.lock().push(format!("{callback} {}{suffix}", descriptor.id));
    }
}

impl LifecycleListener for RecordingListener {
    fn before_load(&self, descriptor: &ModuleDescriptor) {
        self.record("before_load", descriptor);
    }

    fn loaded(&self, descriptor: &ModuleDescriptor) {
        self.record("loaded", descriptor);
    }

    fn before_unload(&self, descriptor: &ModuleDescriptor, is_update: bool) -> Result<(), UnloadVeto> {
        self.record_unload("before_unload", descriptor, is_update);
        match &self.veto {
            Some((module, reason)) if descriptor.id.as_str() == module => Err(UnloadVeto::new(reason.clone())),
            _ => Ok(()),
        }
    }

    fn unloading(&self, descriptor: &ModuleDescriptor, is_update: bool) {
        self.record_unload("unloading", descriptor, is_update);
    }

    fn unloaded(&self, descriptor: &ModuleDescriptor, is_update: bool) {
        self.record_unload("unloaded", descriptor, is_update);
    }
}
