//! End-to-end unload and load scenarios against the in-memory host.

use plexus_dynamic::{BatchOutcome, LifecycleEvent, LoadOptions, UnloadOptions, UnloadPhase, Verification};
use plexus_kernel::ContainerScope::{Application, Workspace};
use plexus_kernel::{ConfigurationError, ModuleDescriptor, ModuleSet};
use plexus_testing::{assert_trace, harness, id, init_tracing, RecordingListener};
use std::sync::Arc;

#[tokio::test]
async fn unload_provider_while_optional_consumer_stays_loaded() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("a").with_extension_point(Application, "a.handlers", true),
        ModuleDescriptor::new("b").with_optional_dependency_descriptor(
            "a",
            ModuleDescriptor::new("b-on-a").with_extension(Application, "a.handlers", "b.Handler"),
        ),
    ]);
    let listener = Arc::new(RecordingListener::new());
    h.manager.add_listener(listener.clone());
    assert!(h.manager.activate_enabled().await.is_success());
    assert_eq!(h.host.app().extensions("a.handlers").len(), 1);

    h.host.trace().clear();
    let mut events = h.manager.subscribe();
    let outcome = h.manager.unload_module(&id("a"), UnloadOptions::default()).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_trace!(
        h.host,
        [
            "application: unregister a.handlers (b:a)",
            "application: reset point a.handlers",
            "application: unregister point a.handlers (a)",
        ]
    );
    assert_eq!(
        outcome.report(&id("a")).and_then(|r| r.verification.clone()),
        Some(Verification::Collected)
    );

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LifecycleEvent::Unload { module, phase } = event {
            assert_eq!(module, id("a"));
            phases.push(phase);
        }
    }
    assert_eq!(phases.first(), Some(&UnloadPhase::Requested));
    assert_eq!(phases.last(), Some(&UnloadPhase::Verified));
    assert!(!phases.contains(&UnloadPhase::Failed));

    assert!(h.manager.is_loaded(&id("b")));
    assert!(!h.manager.is_loaded(&id("a")));
    assert!(listener.calls().ends_with(&[
        "before_unload a".to_string(),
        "unloading a".to_string(),
        "unloaded a".to_string(),
    ]));
}

#[tokio::test]
async fn module_requiring_restart_is_blocked_without_side_effects() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("c")
        .requiring_restart()
        .with_extension_point(Workspace, "c.panels", true)]);
    h.host.open_workspace("ws", &["core"]);
    assert!(h.manager.activate_enabled().await.is_success());
    let before = h.host.snapshot();
    let flushes = h.host.flush_count();

    let blocked = h.manager.can_unload(&[id("c")]).unwrap_err();
    assert_eq!(blocked.module, id("c"));
    assert!(blocked.reason.contains("explicitly marked as requiring restart"));

    let outcome = h.manager.unload_module(&id("c"), UnloadOptions::default()).await;
    assert!(matches!(outcome, BatchOutcome::Blocked(_)));
    assert_eq!(h.host.snapshot(), before);
    assert_eq!(h.host.flush_count(), flushes);
    assert!(h.manager.snapshot().is_enabled(&id("c")));
}

#[tokio::test]
async fn contribution_to_core_non_dynamic_point_blocks_unload() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("d").with_extension(Application, "core.startupActivity", "d.Startup"),
    ]);
    h.host.app().declare_point("core.startupActivity", false);
    assert!(h.manager.activate_enabled().await.is_success());

    let blocked = h.manager.can_unload(&[id("d")]).unwrap_err();
    assert!(blocked.reason.contains("core.startupActivity"), "{}", blocked.reason);
    assert!(blocked.reason.contains("non-dynamic"));
}

#[tokio::test]
async fn cyclic_modules_are_excluded_from_the_set() {
    init_tracing();
    let a = ModuleDescriptor::new("a").with_dependency("b").into_shared();
    let b = ModuleDescriptor::new("b").with_dependency("a").into_shared();
    let standalone = ModuleDescriptor::new("c").into_shared();

    let set = ModuleSet::build(vec![a, b, standalone], vec![id("a"), id("b"), id("c")]);
    assert!(!set.is_enabled(&id("a")));
    assert!(!set.is_enabled(&id("b")));
    assert!(set.is_enabled(&id("c")));
    assert_eq!(
        set.rejected(),
        &[ConfigurationError::CyclicDependency {
            members: vec![id("a"), id("b")],
        }]
    );
}

#[tokio::test]
async fn loading_a_cycle_is_rejected() {
    init_tracing();
    let h = harness(Vec::new());
    let a = ModuleDescriptor::new("a").with_dependency("b").into_shared();
    let b = ModuleDescriptor::new("b").with_dependency("a").into_shared();

    let outcome = h.manager.load_modules(vec![a, b], LoadOptions::default()).await;
    assert!(matches!(outcome, BatchOutcome::Rejected(_)));
    assert_eq!(outcome.refusal(), Some("Cyclic dependency between modules: a -> b"));
    assert!(h.manager.snapshot().is_empty());
    assert!(h.factory.created().is_empty());
}
