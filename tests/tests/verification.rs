//! Leak verification through the lifecycle manager.

use plexus_dynamic::{
    HeapSnapshot, LifecycleEvent, LoadOptions, ReferenceKind, UnloadOptions, Verification,
};
use plexus_kernel::ModuleDescriptor;
use plexus_testing::{id, init_tracing, quick_config, FakeHeapSnapshotter, Harness};
use std::sync::Arc;
use std::time::Duration;

fn leaking_harness(dir: &std::path::Path) -> (Harness, Arc<FakeHeapSnapshotter>) {
    let config = quick_config()
        .with_unload_timeout(Duration::from_millis(30))
        .with_snapshot_dir(dir);
    let harness = Harness::with_config(vec![ModuleDescriptor::new("leaky"), ModuleDescriptor::new("other")], &["leaky", "other"], config);
    let snapshotter = Arc::new(FakeHeapSnapshotter::new());
    let Harness { host, factory, manager } = harness;
    let manager = manager.with_snapshotter(snapshotter.clone());
    (Harness { host, factory, manager }, snapshotter)
}

#[tokio::test]
async fn strong_reference_path_is_reported_and_snapshot_kept() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (h, snapshotter) = leaking_harness(dir.path());
    assert!(h.manager.activate_enabled().await.is_success());

    let held = h.manager.unit(&id("leaky")).unwrap();
    snapshotter.set_snapshot(
        HeapSnapshot::new()
            .with_object(1, "EditorRegistry", None)
            .with_object(2, "leaky.Listener", Some(held.instance_id()))
            .with_reference(1, 2, ReferenceKind::Strong)
            .with_root(1),
    );

    let mut events = h.manager.subscribe();
    let outcome = h
        .manager
        .unload_module(&id("leaky"), UnloadOptions::default().with_memory_snapshot(true))
        .await;
    assert!(outcome.restart_required());

    let report = outcome.report(&id("leaky")).cloned().unwrap();
    let Some(Verification::NotCollected { snapshot, paths }) = report.verification else {
        panic!("expected a leak, got {report:?}");
    };
    assert_eq!(
        paths.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["EditorRegistry -> leaky.Listener".to_string()]
    );
    let snapshot = snapshot.unwrap();
    assert!(snapshot.exists());
    assert_eq!(snapshotter.captured(), vec![snapshot]);

    let mut restart_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, LifecycleEvent::RestartRequired { .. }) {
            restart_events += 1;
        }
    }
    assert_eq!(restart_events, 1);
    assert!(h.manager.zombies().is_zombie(&id("leaky")));
    drop(held);
}

#[tokio::test]
async fn weak_only_references_count_as_collected() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (h, snapshotter) = leaking_harness(dir.path());
    assert!(h.manager.activate_enabled().await.is_success());

    let held = h.manager.unit(&id("leaky")).unwrap();
    snapshotter.set_snapshot(
        HeapSnapshot::new()
            .with_object(1, "WeakCache", None)
            .with_object(2, "leaky.Service", Some(held.instance_id()))
            .with_reference(1, 2, ReferenceKind::Weak)
            .with_root(1),
    );

    let outcome = h
        .manager
        .unload_module(&id("leaky"), UnloadOptions::default().with_memory_snapshot(true))
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(!h.manager.restart_required());
    assert_eq!(snapshotter.captured().len(), 1);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    drop(held);
}

#[tokio::test]
async fn without_deep_check_no_snapshot_is_taken() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (h, snapshotter) = leaking_harness(dir.path());
    assert!(h.manager.activate_enabled().await.is_success());
    let held = h.manager.unit(&id("leaky")).unwrap();

    let outcome = h.manager.unload_module(&id("leaky"), UnloadOptions::default()).await;
    assert!(matches!(
        outcome.report(&id("leaky")).and_then(|r| r.verification.clone()),
        Some(Verification::NotCollected { snapshot: None, .. })
    ));
    assert!(snapshotter.captured().is_empty());

    drop(held);
    let other = h.descriptor("other");
    let refused = h.manager.load_module(other, LoadOptions::default()).await;
    assert_eq!(refused.refusal(), Some("Module other is already loaded"));
    let next = h.manager.unload_module(&id("other"), UnloadOptions::default()).await;
    assert_eq!(next.refusal(), Some("Host restart is already required"));
}

#[tokio::test]
async fn collected_units_leave_no_zombie() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (h, snapshotter) = leaking_harness(dir.path());
    assert!(h.manager.activate_enabled().await.is_success());

    let outcome = h
        .manager
        .unload_module(&id("leaky"), UnloadOptions::default().with_memory_snapshot(true))
        .await;
    assert!(outcome.is_success());
    assert!(h.manager.zombies().ids().is_empty());
    assert!(snapshotter.captured().is_empty());
}
