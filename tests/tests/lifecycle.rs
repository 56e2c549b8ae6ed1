//! Batch behavior of the lifecycle manager.

use plexus_dynamic::{BatchOutcome, LoadOptions, UnloadOptions};
use plexus_kernel::ContainerScope::{Application, Workspace};
use plexus_kernel::{ModuleDescriptor, ServiceDecl};
use plexus_testing::{assert_trace, harness, id, init_tracing, RecordingListener, UnitScript};
use std::sync::Arc;

#[tokio::test]
async fn background_tasks_are_joined_before_release() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("indexer")]);
    h.factory.script("indexer", UnitScript::with_background_task());
    assert!(h.manager.activate_enabled().await.is_success());
    assert_eq!(h.factory.task_stopped("indexer"), Some(false));

    let outcome = h.manager.unload_module(&id("indexer"), UnloadOptions::default()).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(h.factory.task_stopped("indexer"), Some(true));
}

#[tokio::test]
async fn unit_owned_resources_are_released() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("a")]);
    assert!(h.manager.activate_enabled().await.is_success());
    let unit_id = match h.manager.unit(&id("a")) {
        Some(unit) => unit.instance_id(),
        None => panic!("unit of a not loaded"),
    };
    h.host.app().add_disposable("a.toolWindow", Some(unit_id));
    h.host.app().add_disposable("core.statusBar", None);
    h.host.app().connect(unit_id, "vfs.changes");

    assert!(h.manager.unload_module(&id("a"), UnloadOptions::default()).await.is_success());
    let state = h.host.app().state();
    assert_eq!(state.disposables.len(), 1);
    assert_eq!(state.disposables[0].name, "core.statusBar");
    assert!(state.connections.is_empty());
}

#[tokio::test]
async fn content_modules_are_torn_down_before_their_owner() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("m")
        .with_service(Application, ServiceDecl::new("m.Api", "m.ApiImpl"))
        .with_content_module(
            ModuleDescriptor::new("m.editor").with_extension(Application, "host.actions", "m.EditorAction"),
        )]);
    h.host.app().declare_point("host.actions", true);
    let before = h.host.snapshot();
    assert!(h.manager.activate_enabled().await.is_success());
    assert_eq!(
        h.host.app().extensions("host.actions"),
        vec![(id("m.editor"), "m.EditorAction".to_string())]
    );

    h.host.trace().clear();
    assert!(h.manager.unload_module(&id("m"), UnloadOptions::default()).await.is_success());
    assert_trace!(
        h.host,
        [
            "application: unregister host.actions (m.editor)",
            "application: unload service m.Api (m)",
        ]
    );
    assert_eq!(h.host.snapshot(), before);
}

#[tokio::test]
async fn workspace_contributions_reach_every_open_workspace() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("p").with_extension_point(Workspace, "p.tools", true),
        ModuleDescriptor::new("q")
            .with_dependency("p")
            .with_extension(Workspace, "p.tools", "q.Tool"),
    ]);
    h.host.open_workspace("ws1", &["core"]);
    h.host.open_workspace("ws2", &[]);
    let before = h.host.snapshot();
    assert!(h.manager.activate_enabled().await.is_success());
    for workspace in h.host.workspace_refs() {
        assert_eq!(workspace.container_ref().extensions("p.tools").len(), 1);
    }

    let outcome = h.manager.unload_module(&id("p"), UnloadOptions::default()).await;
    assert!(outcome.is_success(), "{outcome:?}");
    let order: Vec<_> = outcome.reports().iter().map(|r| r.module.clone()).collect();
    assert_eq!(order, vec![id("q"), id("p")]);
    assert_eq!(h.host.snapshot(), before);
}

#[tokio::test]
async fn implementation_details_follow_their_host_module() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("lang"),
        ModuleDescriptor::new("lang.impl")
            .with_dependency("lang")
            .as_implementation_detail(),
    ]);
    assert!(h.manager.activate_enabled().await.is_success());

    let outcome = h.manager.unload_module(&id("lang"), UnloadOptions::default()).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(!h.manager.is_loaded(&id("lang.impl")));

    let lang = h.descriptor("lang");
    let reloaded = h.manager.load_module(lang, LoadOptions::default()).await;
    assert!(reloaded.is_success(), "{reloaded:?}");
    assert!(h.manager.is_loaded(&id("lang.impl")));
}

#[tokio::test]
async fn unsafe_implementation_detail_blocks_its_host_module() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("lang"),
        ModuleDescriptor::new("lang.impl")
            .with_dependency("lang")
            .with_extension(Application, "host.static", "lang.Static")
            .as_implementation_detail(),
    ]);
    h.host.app().declare_point("host.static", false);
    assert!(h.manager.activate_enabled().await.is_success());

    let outcome = h.manager.unload_module(&id("lang"), UnloadOptions::default()).await;
    let reason = outcome.refusal().unwrap_or_default();
    assert!(reason.contains("non-dynamic extension point host.static"), "{reason}");
    assert!(h.manager.is_loaded(&id("lang")));
    assert!(h.manager.is_loaded(&id("lang.impl")));
}

#[tokio::test]
async fn veto_on_any_member_cancels_the_batch() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("a"),
        ModuleDescriptor::new("c").with_dependency("a"),
    ]);
    let listener = Arc::new(RecordingListener::vetoing("a", "a has running builds"));
    h.manager.add_listener(listener.clone());
    assert!(h.manager.activate_enabled().await.is_success());

    let outcome = h.manager.unload_module(&id("a"), UnloadOptions::default()).await;
    assert_eq!(
        outcome,
        BatchOutcome::Vetoed {
            module: id("a"),
            reason: "a has running builds".to_string(),
        }
    );
    assert!(h.manager.is_loaded(&id("a")));
    assert!(h.manager.is_loaded(&id("c")));
    assert!(!listener.calls().iter().any(|c| c.starts_with("unloading")));
}

#[tokio::test]
async fn failed_unit_creation_disables_module_and_its_dependents() {
    init_tracing();
    let h = harness(Vec::new());
    h.factory.script("b", UnitScript::failing());
    let b = ModuleDescriptor::new("b").into_shared();
    let c = ModuleDescriptor::new("c").with_dependency("b").into_shared();

    let outcome = h.manager.load_modules(vec![c, b], LoadOptions::default()).await;
    assert!(!outcome.is_success());
    assert!(!outcome.restart_required());

    let b_report = outcome.report(&id("b")).cloned().unwrap_or_else(|| panic!("no report for b"));
    assert!(b_report.error.unwrap_or_default().contains("creating execution unit failed"));
    let c_report = outcome.report(&id("c")).cloned().unwrap_or_else(|| panic!("no report for c"));
    assert_eq!(
        c_report.error.as_deref(),
        Some("Module c lost a required dependency during the batch")
    );

    let set = h.manager.snapshot();
    assert!(!set.is_enabled(&id("b")));
    assert!(!set.is_enabled(&id("c")));
    assert!(!h.manager.is_loaded(&id("b")));
    assert!(h.factory.created().is_empty());
}

#[tokio::test]
async fn update_replaces_the_descriptor() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("a").with_version("1.0.0")]);
    assert!(h.manager.activate_enabled().await.is_success());

    let removed = h.manager.unload_module(&id("a"), UnloadOptions::for_update()).await;
    assert!(removed.is_success(), "{removed:?}");
    assert!(!h.manager.snapshot().contains(&id("a")));

    let updated = ModuleDescriptor::new("a").with_version("2.0.0").into_shared();
    assert!(h.manager.load_module(updated, LoadOptions::default()).await.is_success());
    let version = h.manager.snapshot().get(&id("a")).map(|d| d.version.clone());
    assert_eq!(version.as_deref(), Some("2.0.0"));
}

#[tokio::test]
async fn update_brings_dependents_back_with_the_new_version() {
    init_tracing();
    let h = harness(vec![
        ModuleDescriptor::new("vcs")
            .with_version("1.0.0")
            .with_extension_point(Application, "vcs.providers", true),
        ModuleDescriptor::new("git")
            .with_dependency("vcs")
            .with_extension(Application, "vcs.providers", "git.Provider"),
        ModuleDescriptor::new("blame").with_optional_dependency_descriptor(
            "vcs",
            ModuleDescriptor::new("blame").with_extension(Application, "vcs.providers", "blame.Provider"),
        ),
    ]);
    let listener = Arc::new(RecordingListener::new());
    h.manager.add_listener(listener.clone());
    assert!(h.manager.activate_enabled().await.is_success());

    let removed = h.manager.unload_module(&id("vcs"), UnloadOptions::for_update()).await;
    assert!(removed.is_success(), "{removed:?}");
    let order: Vec<_> = removed.reports().iter().map(|r| r.module.clone()).collect();
    assert_eq!(order, vec![id("git"), id("vcs")]);
    assert!(h.manager.snapshot().contains(&id("git")));
    assert!(!h.manager.is_loaded(&id("git")));
    assert!(h.manager.is_loaded(&id("blame")));
    assert!(h.host.app().extensions("vcs.providers").is_empty());

    let unload_calls: Vec<String> = listener
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("unload") || c.starts_with("before_unload"))
        .collect();
    assert_eq!(
        unload_calls,
        vec![
            "before_unload git (update)",
            "before_unload vcs (update)",
            "unloading git (update)",
            "unloaded git (update)",
            "unloading vcs (update)",
            "unloaded vcs (update)",
        ]
    );

    let updated = ModuleDescriptor::new("vcs")
        .with_version("2.0.0")
        .with_extension_point(Application, "vcs.providers", true)
        .into_shared();
    let reloaded = h.manager.load_module(updated, LoadOptions::default()).await;
    assert!(reloaded.is_success(), "{reloaded:?}");
    assert!(h.manager.is_loaded(&id("git")));
    let mut providers = h.host.app().extensions("vcs.providers");
    providers.sort();
    assert_eq!(
        providers,
        vec![
            (id("blame:vcs"), "blame.Provider".to_string()),
            (id("git"), "git.Provider".to_string()),
        ]
    );
}

#[tokio::test]
async fn concurrent_batches_are_serialized() {
    init_tracing();
    let h = harness(vec![ModuleDescriptor::new("a"), ModuleDescriptor::new("b")]);
    assert!(h.manager.activate_enabled().await.is_success());

    let a = id("a");
    let b = id("b");
    let (first, second) = tokio::join!(
        h.manager.unload_module(&a, UnloadOptions::default()),
        h.manager.unload_module(&b, UnloadOptions::default()),
    );
    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(h.manager.batches_in_progress(), 0);
    assert!(h.manager.snapshot().enabled_ids().is_empty());
}
