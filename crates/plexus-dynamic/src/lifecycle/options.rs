//! Per-batch options.

use std::time::Duration;

/// 卸载选项
/// Options of an unload batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnloadOptions {
    /// Keep the descriptor in the set as disabled. When `false` the module is
    /// removed from the set entirely (uninstall, update).
    pub disable: bool,
    /// The module is being replaced by a newer version.
    pub is_update: bool,
    /// Persist the resulting module set state.
    pub save: bool,
    /// Capture a heap snapshot if the unit is not collected in time.
    pub require_memory_snapshot: bool,
    /// Wait up to the unload timeout for the unit to be collected. When
    /// `false` the weak handle is checked once; a unit still alive stays in
    /// the zombie registry without failing the unload.
    pub wait_for_unit_unload: bool,
    /// Run the safety check on implementation-detail dependents.
    pub check_implementation_details: bool,
    /// Overrides the configured unload timeout.
    pub unload_timeout: Option<Duration>,
}

impl Default for UnloadOptions {
    fn default() -> Self {
        Self {
            disable: true,
            is_update: false,
            save: true,
            require_memory_snapshot: false,
            wait_for_unit_unload: true,
            check_implementation_details: true,
            unload_timeout: None,
        }
    }
}

impl UnloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for replacing a module with a new version.
    pub fn for_update() -> Self {
        Self {
            disable: false,
            is_update: true,
            ..Self::default()
        }
    }

    pub fn with_disable(mut self, disable: bool) -> Self {
        self.disable = disable;
        self
    }

    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    pub fn with_memory_snapshot(mut self, required: bool) -> Self {
        self.require_memory_snapshot = required;
        self
    }

    pub fn with_wait_for_unit_unload(mut self, wait: bool) -> Self {
        self.wait_for_unit_unload = wait;
        self
    }

    pub fn with_check_implementation_details(mut self, check: bool) -> Self {
        self.check_implementation_details = check;
        self
    }

    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout = Some(timeout);
        self
    }
}

/// 加载选项
/// Options of a load batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub save: bool,
    /// Run the safety check on implementation-detail dependents that become loadable.
    pub check_implementation_details: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            save: true,
            check_implementation_details: true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    pub fn with_check_implementation_details(mut self, check: bool) -> Self {
        self.check_implementation_details = check;
        self
    }
}
