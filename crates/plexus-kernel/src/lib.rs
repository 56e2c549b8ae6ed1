// module metadata, module sets and dependency graph
pub mod module;
pub use module::*;

// execution units
pub mod unit;
pub use unit::{ExecutionUnit, UnitInstanceId, UnitState};

// host collaborator contracts
pub mod host;

// error module
pub mod error;
pub use error::{ConfigurationError, IntoLifecycleReport, LifecycleError, LifecycleResult};
