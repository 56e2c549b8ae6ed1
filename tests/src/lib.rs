//! Plexus Testing
//!
//! Fixtures for exercising the module engine against an in-memory host:
//! recording listeners, scripted execution unit factories and a heap
//! snapshotter that serves a prepared object graph.

pub mod factory;
pub mod fixtures;
pub mod listener;
pub mod snapshotter;

pub use factory::{ScriptedUnitFactory, UnitScript};
pub use fixtures::{harness, id, quick_config, Harness};
pub use listener::RecordingListener;
pub use snapshotter::FakeHeapSnapshotter;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Assert the in-memory host trace, printing the full trace on mismatch.
#[macro_export]
macro_rules! assert_trace {
    ($host:expr, [$($entry:expr),* $(,)?]) => {
        let actual = $host.trace().entries();
        let expected: Vec<String> = vec![$($entry.to_string()),*];
        assert_eq!(
            actual, expected,
            "Unexpected registry trace:\n{}",
            actual.join("\n")
        );
    };
}
