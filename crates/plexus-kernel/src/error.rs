//! Crate-level error types for `plexus-kernel`.
//!
//! Two families live here:
//!
//! - [`ConfigurationError`]: problems detected while assembling a
//!   [`ModuleSet`](crate::module::ModuleSet) (cycles, missing required
//!   dependencies, duplicate ids). They never propagate; the offending modules
//!   are excluded and the error is recorded on the set.
//! - [`LifecycleError`]: failures reported by host collaborators during
//!   registration, teardown and persistence. Collaborators return them wrapped
//!   in an [`error_stack::Report`] (via [`LifecycleResult`]) so the orchestrator
//!   can log the full context chain before downgrading the failure.
//!
//! # Usage
//!
//! ```rust,ignore
//! use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
//! use error_stack::ResultExt;
//!
//! fn persist(bytes: &[u8]) -> LifecycleResult<()> {
//!     std::fs::write("modules.json", bytes)
//!         .map_err(LifecycleError::from)
//!         .into_report()
//!         .attach("writing module state")?;
//!     Ok(())
//! }
//! ```

use error_stack::Report;
use thiserror::Error;

use crate::module::ModuleId;

/// Error-stack backed result alias for lifecycle collaborator operations.
///
/// Equivalent to `Result<T, error_stack::Report<LifecycleError>>`.
pub type LifecycleResult<T> = ::std::result::Result<T, Report<LifecycleError>>;

/// Extension trait to convert `Result<T, LifecycleError>` into [`LifecycleResult<T>`].
pub trait IntoLifecycleReport<T> {
    /// Wrap the error in an `error_stack::Report`.
    fn into_report(self) -> LifecycleResult<T>;
}

impl<T> IntoLifecycleReport<T> for ::std::result::Result<T, LifecycleError> {
    #[inline]
    fn into_report(self) -> LifecycleResult<T> {
        self.map_err(Report::new)
    }
}

/// Errors surfaced by host collaborators while a module is being wired in or torn down.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    /// The requested module is not part of the current module set.
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// An extension was contributed to a point that no container declares.
    #[error("Extension point not found: {0}")]
    ExtensionPointNotFound(String),

    /// A container refused a registration or unregistration.
    #[error("Container {container} rejected operation: {reason}")]
    Container {
        /// Name of the container (application, workspace or unit).
        container: String,
        /// Human readable reason.
        reason: String,
    },

    /// A service host failed to register or unload services.
    #[error("Service host error: {0}")]
    Service(String),

    /// The execution unit of a module could not be created or released.
    #[error("Execution unit error: {0}")]
    Unit(String),

    /// The module state store failed to persist or read state.
    #[error("State store error: {0}")]
    Store(String),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Fatal problems found while assembling a module set.
///
/// The offending module is excluded from the set; every other module stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Two or more modules depend on each other (directly or transitively).
    #[error("Cyclic dependency between modules: {}", join_ids(.members))]
    CyclicDependency {
        /// Members of the strongly connected component, sorted by id.
        members: Vec<ModuleId>,
    },

    /// A non-optional dependency does not resolve to any module of the set.
    #[error("Required dependency {dependency} of module {module} is missing from the module set")]
    MissingDependency {
        /// The module declaring the dependency.
        module: ModuleId,
        /// The unresolved dependency target.
        dependency: ModuleId,
    },

    /// The same id was supplied more than once.
    #[error("Duplicate module id: {0}")]
    DuplicateModule(ModuleId),
}

impl ConfigurationError {
    /// Modules excluded from the set because of this error.
    pub fn affected_modules(&self) -> Vec<&ModuleId> {
        match self {
            ConfigurationError::CyclicDependency { members } => members.iter().collect(),
            ConfigurationError::MissingDependency { module, .. } => vec![module],
            ConfigurationError::DuplicateModule(id) => vec![id],
        }
    }
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
