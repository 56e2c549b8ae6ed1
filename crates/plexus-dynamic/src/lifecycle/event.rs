//! Lifecycle phases, per-module reports and broadcast events.

use plexus_kernel::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::safety::UnloadBlocked;
use crate::verifier::Verification;

/// 卸载阶段
/// Phases of the unload state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnloadPhase {
    Requested,
    SafetyChecked,
    Quiesced,
    Unregistered,
    Disposed,
    UnitReleased,
    Verified,
    /// A listener cancelled the batch.
    Vetoed,
    Failed,
}

/// 加载阶段
/// Phases of the load state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadPhase {
    Requested,
    DependenciesResolved,
    Registered,
    Activated,
    Rejected,
}

impl fmt::Display for UnloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 生命周期事件
/// Event broadcast by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Unload { module: ModuleId, phase: UnloadPhase },
    Load { module: ModuleId, phase: LoadPhase },
    /// A batch was refused before any mutation.
    Blocked { module: ModuleId, reason: String },
    /// A teardown or verification failure left the host in a state that needs a restart.
    RestartRequired { module: ModuleId, reason: String },
}

/// What happened to one batch member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub module: ModuleId,
    /// First failure hit while wiring or tearing down the module.
    pub error: Option<String>,
    /// Only set for unloads.
    pub verification: Option<Verification>,
    /// The failure left registries in a state only a restart can clean up.
    pub restart_required: bool,
}

impl ModuleReport {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            error: None,
            verification: None,
            restart_required: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.verification.as_ref().is_none_or(Verification::is_collected)
    }
}

/// 批处理结果
/// Result of a load or unload batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every member was processed; some may have failed.
    Completed {
        reports: Vec<ModuleReport>,
        restart_required: bool,
    },
    /// Unload refused by the safety check. Nothing was changed.
    Blocked(UnloadBlocked),
    /// Load refused by the safety check or the module set. Nothing was changed.
    Rejected(UnloadBlocked),
    /// A listener refused the unload. Nothing was changed.
    Vetoed { module: ModuleId, reason: String },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            BatchOutcome::Completed {
                reports,
                restart_required,
            } => !restart_required && reports.iter().all(ModuleReport::succeeded),
            _ => false,
        }
    }

    pub fn restart_required(&self) -> bool {
        matches!(
            self,
            BatchOutcome::Completed {
                restart_required: true,
                ..
            }
        )
    }

    pub fn reports(&self) -> &[ModuleReport] {
        match self {
            BatchOutcome::Completed { reports, .. } => reports,
            _ => &[],
        }
    }

    pub fn report(&self, module: &ModuleId) -> Option<&ModuleReport> {
        self.reports().iter().find(|r| &r.module == module)
    }

    /// Reason the batch was refused, if it was.
    pub fn refusal(&self) -> Option<&str> {
        match self {
            BatchOutcome::Blocked(blocked) | BatchOutcome::Rejected(blocked) => Some(&blocked.reason),
            BatchOutcome::Vetoed { reason, .. } => Some(reason),
            BatchOutcome::Completed { .. } => None,
        }
    }
}
