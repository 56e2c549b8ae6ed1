//! Load and unload orchestration.
//!
//! Unload: `Requested → SafetyChecked → Quiesced → Unregistered → Disposed →
//! UnitReleased → Verified`, or `Vetoed` / `Failed`.
//!
//! Load: `Requested → DependenciesResolved → Registered → Activated`, or `Rejected`.

pub mod event;
pub mod manager;
pub mod options;

pub use event::{BatchOutcome, LifecycleEvent, LoadPhase, ModuleReport, UnloadPhase};
pub use manager::ModuleLifecycleManager;
pub use options::{LoadOptions, UnloadOptions};
