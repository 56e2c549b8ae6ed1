//! Persistence of which modules are enabled.

use async_trait::async_trait;
use error_stack::ResultExt;
use parking_lot::Mutex;
use plexus_kernel::error::{IntoLifecycleReport, LifecycleError, LifecycleResult};
use plexus_kernel::host::ModuleStateStore;
use plexus_kernel::{ModuleDescriptor, ModuleSet, ModuleSetState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Build the startup module set from persisted state.
///
/// Modules listed as disabled stay disabled; every other module is enabled,
/// including modules the store has never seen.
pub async fn restore_set(
    descriptors: Vec<Arc<ModuleDescriptor>>,
    store: &dyn ModuleStateStore,
) -> LifecycleResult<ModuleSet> {
    let state = store.load().await?.unwrap_or_default();
    let enabled: Vec<_> = descriptors
        .iter()
        .map(|d| d.id.clone())
        .filter(|id| !state.disabled.contains(id))
        .collect();
    debug!(known = descriptors.len(), disabled = state.disabled.len(), "Restoring module set");
    Ok(ModuleSet::build(descriptors, enabled))
}

/// JSON file store
///
/// Writes go to a sibling temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ModuleStateStore for JsonFileStateStore {
    async fn save(&self, state: &ModuleSetState) -> LifecycleResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LifecycleError::from)
                .into_report()
                .attach(format!("creating {}", parent.display()))?;
        }

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(LifecycleError::from)
            .into_report()?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(LifecycleError::from)
            .into_report()
            .attach(format!("writing {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(LifecycleError::from)
            .into_report()
            .attach(format!("replacing {}", self.path.display()))?;

        debug!(path = %self.path.display(), enabled = state.enabled.len(), "Module state saved");
        Ok(())
    }

    async fn load(&self) -> LifecycleResult<Option<ModuleSetState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LifecycleError::from(e))
                    .into_report()
                    .attach(format!("reading {}", self.path.display()));
            }
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(LifecycleError::from)
            .into_report()
            .attach(format!("parsing {}", self.path.display()))?;
        Ok(Some(state))
    }
}

/// Store kept in memory, mostly for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: Mutex<Option<ModuleSetState>>,
    saves: Mutex<usize>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ModuleSetState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    pub fn current(&self) -> Option<ModuleSetState> {
        self.state.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl ModuleStateStore for InMemoryStateStore {
    async fn save(&self, state: &ModuleSetState) -> LifecycleResult<()> {
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    async fn load(&self) -> LifecycleResult<Option<ModuleSetState>> {
        Ok(self.state.lock().clone())
    }
}
