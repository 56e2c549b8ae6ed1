//! 动态模块引擎
//!
//! 在不重启宿主的情况下加载与卸载模块：
//! - 卸载安全检查
//! - 扩展注册与注销
//! - 批量加载/卸载编排
//! - 卸载后的内存泄漏校验
//!
//! Loads and unloads modules into a running host without a restart.

pub mod config;
pub mod extensions;
pub mod lifecycle;
pub mod memory;
pub mod safety;
pub mod store;
pub mod verifier;
pub mod zombie;

pub use config::{AllowListEntry, ConfigError, ConfigResult, DynamicModulesConfig};
pub use extensions::{sub_descriptor_owner, ExtensionWiring};
pub use lifecycle::{
    BatchOutcome, LifecycleEvent, LoadOptions, LoadPhase, ModuleLifecycleManager, ModuleReport, UnloadOptions,
    UnloadPhase,
};
pub use memory::{EmptyUnitFactory, InMemoryHost};
pub use safety::{SafetyContext, UnloadBlocked, UnloadSafety};
pub use store::{restore_set, InMemoryStateStore, JsonFileStateStore};
pub use verifier::{HeapSnapshot, HeapSnapshotter, LeakVerifier, ReferenceKind, ReferencePath, Verification};
pub use zombie::ZombieRegistry;
