//! Module state persistence and engine configuration.

use plexus_dynamic::{
    restore_set, DynamicModulesConfig, InMemoryHost, JsonFileStateStore, LoadOptions, ModuleLifecycleManager,
    UnloadOptions,
};
use plexus_kernel::host::{ExecutionUnitFactory, HostEnvironment, ModuleStateStore};
use plexus_kernel::{ModuleDescriptor, ModuleSetState};
use plexus_testing::{id, init_tracing, quick_config, ScriptedUnitFactory};
use std::sync::Arc;
use std::time::Duration;

fn catalog() -> Vec<Arc<ModuleDescriptor>> {
    vec![
        ModuleDescriptor::new("git").into_shared(),
        ModuleDescriptor::new("markdown").into_shared(),
    ]
}

async fn start(store: Arc<JsonFileStateStore>) -> ModuleLifecycleManager {
    let set = restore_set(catalog(), store.as_ref()).await.unwrap();
    let manager = ModuleLifecycleManager::new(
        Arc::new(InMemoryHost::new()) as Arc<dyn HostEnvironment>,
        Arc::new(ScriptedUnitFactory::new()) as Arc<dyn ExecutionUnitFactory>,
        set,
        quick_config(),
    )
    .with_store(store);
    assert!(manager.activate_enabled().await.is_success());
    manager
}

#[tokio::test]
async fn disabled_modules_stay_disabled_across_restarts() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStateStore::new(dir.path().join("modules.json")));

    let first = start(Arc::clone(&store)).await;
    assert!(first.is_loaded(&id("git")));
    assert!(first.unload_module(&id("git"), UnloadOptions::default()).await.is_success());
    assert_eq!(
        store.load().await.unwrap(),
        Some(ModuleSetState {
            enabled: vec![id("markdown")],
            disabled: vec![id("git")],
        })
    );
    drop(first);

    let second = start(Arc::clone(&store)).await;
    assert!(!second.is_loaded(&id("git")));
    assert!(second.is_loaded(&id("markdown")));

    let git = second.snapshot().get(&id("git")).cloned().unwrap();
    assert!(second.load_module(git, LoadOptions::default()).await.is_success());
    let state = store.load().await.unwrap().unwrap();
    assert!(state.disabled.is_empty());
}

#[tokio::test]
async fn engine_config_reads_toml_with_env_overrides() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plexus.toml");
    std::fs::write(
        &path,
        r#"
allow_unload = true
unload_timeout_ms = 1500
snapshot_dir = "${PLEXUS_IT_SNAPSHOTS}"

[[extension_allow_list]]
point_prefix = "vcs."
module = "git"
"#,
    )
    .unwrap();
    // SAFETY: variables are unique to this test.
    unsafe {
        std::env::set_var("PLEXUS_IT_SNAPSHOTS", "/var/tmp/plexus");
        std::env::set_var("PLEXUSIT_ALLOW_UNLOAD", "false");
    }

    let config = DynamicModulesConfig::from_file_with_env(&path, "PLEXUSIT").unwrap();
    assert!(!config.allow_unload);
    assert_eq!(config.unload_timeout(), Duration::from_millis(1500));
    assert_eq!(config.snapshot_dir(), std::path::PathBuf::from("/var/tmp/plexus"));
    assert!(config.is_allow_listed("vcs.log.provider", "git"));
    assert!(!config.is_allow_listed("vcs.log.provider", "markdown"));
}
