//! Plugin lifecycle manager
//!
//! Owns the registry, the durable enabled/auto-load state, the package
//! manager bridge, and the per-plugin busy flags that keep two lifecycle
//! operations from interleaving on the same id. Unrelated ids proceed
//! concurrently; a second operation on a busy id is rejected immediately,
//! never queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::application::errors::PluginError;
use crate::domain::entities::PluginStatus;
use crate::infrastructure::package_manager::{PackageManager, PkgOperation};
use crate::infrastructure::state::PluginStateStore;
use crate::plugins::host::PluginHost;
use crate::plugins::registry::{Discoverer, PluginRegistry};

/// Result of `enable`: enabling succeeded once persisted; the follow-up
/// load may still have failed and is reported alongside.
#[derive(Debug)]
pub struct EnableOutcome {
    pub load_error: Option<PluginError>,
}

/// Result of `disable`: the follow-up unload is best-effort
#[derive(Debug)]
pub struct DisableOutcome {
    pub unload_error: Option<PluginError>,
}

/// Result of `install`: the package is installed and auto-load persisted;
/// the immediate load may still have failed.
#[derive(Debug)]
pub struct InstallOutcome {
    pub load_error: Option<PluginError>,
}

pub struct PluginManager {
    registry: PluginRegistry,
    discoverer: Discoverer,
    host: Arc<PluginHost>,
    state: Arc<PluginStateStore>,
    package_manager: Arc<dyn PackageManager>,
    busy: Mutex<HashSet<String>>,
}

/// Releases the id's busy flag when the operation finishes, success or not
struct BusyGuard<'a> {
    id: String,
    busy: &'a Mutex<HashSet<String>>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.id);
        }
    }
}

impl PluginManager {
    /// Build the manager and register the enabled-state policy hook with
    /// the host.
    pub fn new(
        host: Arc<PluginHost>,
        state: Arc<PluginStateStore>,
        package_manager: Arc<dyn PackageManager>,
        discoverer: Discoverer,
    ) -> Result<Self, PluginError> {
        let hook_state = Arc::clone(&state);
        host.register_load_hook("plugin_state", move |ctx| {
            let enabled = hook_state.enabled(&ctx.plugin_id);
            if !enabled {
                tracing::info!("plugin '{}' is disabled, skipping load", ctx.plugin_id);
            }
            enabled
        })?;

        Ok(Self {
            registry: PluginRegistry::new(),
            discoverer,
            host,
            state,
            package_manager,
            busy: Mutex::new(HashSet::new()),
        })
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub fn state(&self) -> &Arc<PluginStateStore> {
        &self.state
    }

    fn try_begin(&self, id: &str) -> Result<BusyGuard<'_>, PluginError> {
        let mut busy = self
            .busy
            .lock()
            .map_err(|_| PluginError::Internal("busy-set lock poisoned".to_string()))?;
        if !busy.insert(id.to_string()) {
            return Err(PluginError::Busy(id.to_string()));
        }
        Ok(BusyGuard {
            id: id.to_string(),
            busy: &self.busy,
        })
    }

    /// Refresh the registry: probe every candidate and atomically install
    /// the new snapshot. Holds no per-id lock, so it may run alongside
    /// lifecycle operations.
    pub fn discover(&self) -> Result<usize, PluginError> {
        let snapshot = self.discoverer.build_snapshot();
        let count = snapshot.len();
        self.registry.install(snapshot)?;
        tracing::info!("plugin registry refreshed, {} plugins known", count);
        Ok(count)
    }

    /// Known plugins in stable order, annotated with current state
    pub fn list(&self, refresh: bool) -> Result<Vec<PluginStatus>, PluginError> {
        if refresh {
            self.discover()?;
        }
        let snapshot = self.registry.snapshot();
        Ok(snapshot
            .values()
            .map(|record| PluginStatus {
                record: record.clone(),
                enabled: self.state.enabled(&record.id),
                auto_load: self.state.auto_load(&record.id),
                loaded: self.host.is_loaded(&record.id),
            })
            .collect())
    }

    /// Mark a plugin enabled, persist, then try to load it. A load failure
    /// does not undo the enable; it is carried in the outcome.
    pub async fn enable(&self, id: &str) -> Result<EnableOutcome, PluginError> {
        let _guard = self.try_begin(id)?;
        self.registry.lookup(id)?;

        if self.state.enabled(id) {
            return Err(PluginError::AlreadyInState {
                id: id.to_string(),
                state: "enabled",
            });
        }

        self.state
            .update(|doc| {
                doc.enabled.insert(id.to_string(), true);
            })
            .await?;

        let load_error = self.host.load_module(id).err();
        if let Some(ref e) = load_error {
            tracing::warn!("plugin '{}' enabled but load failed: {}", id, e);
        }
        Ok(EnableOutcome { load_error })
    }

    /// Mark a plugin disabled, persist, then unload it best-effort
    pub async fn disable(&self, id: &str) -> Result<DisableOutcome, PluginError> {
        let _guard = self.try_begin(id)?;
        self.registry.lookup(id)?;

        if !self.state.enabled(id) {
            return Err(PluginError::AlreadyInState {
                id: id.to_string(),
                state: "disabled",
            });
        }

        self.state
            .update(|doc| {
                doc.enabled.insert(id.to_string(), false);
            })
            .await?;

        let unload_error = self.host.unload_module(id).err();
        if let Some(ref e) = unload_error {
            tracing::warn!("plugin '{}' disabled but unload failed: {}", id, e);
        }
        Ok(DisableOutcome { unload_error })
    }

    /// Load a known plugin through the hook-gated host
    pub fn load(&self, id: &str) -> Result<(), PluginError> {
        let _guard = self.try_begin(id)?;
        self.registry.lookup(id)?;
        self.host.load_module(id)
    }

    /// Unload a known plugin; unloading an unloaded plugin succeeds
    pub fn unload(&self, id: &str) -> Result<(), PluginError> {
        let _guard = self.try_begin(id)?;
        self.registry.lookup(id)?;
        self.host.unload_module(id)
    }

    /// Install a package through the package manager. On any subprocess
    /// failure nothing is mutated. On success the package is marked for
    /// auto-load, loaded, and the registry refreshed; visibility in the
    /// registry is only guaranteed after that refresh.
    pub async fn install(&self, id: &str) -> Result<InstallOutcome, PluginError> {
        let _guard = self.try_begin(id)?;

        let outcome = self.package_manager.run(PkgOperation::Add, id).await?;
        if !outcome.success() {
            return Err(PluginError::PackageManagerFailed {
                code: outcome.exit_code,
                stderr: outcome.excerpt(),
            });
        }

        self.state
            .update(|doc| {
                doc.auto_load.insert(id.to_string(), true);
            })
            .await?;

        let load_error = self.host.load_module(id).err();
        if let Some(ref e) = load_error {
            tracing::warn!("plugin '{}' installed but load failed: {}", id, e);
        }

        self.discover()?;
        Ok(InstallOutcome { load_error })
    }

    /// Remove a package: best-effort unload, then the remove subprocess.
    /// A failed removal leaves all persisted state untouched.
    pub async fn uninstall(&self, id: &str) -> Result<(), PluginError> {
        let _guard = self.try_begin(id)?;
        self.registry.lookup(id)?;

        if let Err(e) = self.host.unload_module(id) {
            tracing::warn!("unload before removal of '{}' failed: {}", id, e);
        }

        let outcome = self.package_manager.run(PkgOperation::Remove, id).await?;
        if !outcome.success() {
            return Err(PluginError::PackageManagerFailed {
                code: outcome.exit_code,
                stderr: outcome.excerpt(),
            });
        }

        self.state
            .update(|doc| {
                doc.enabled.remove(id);
                doc.auto_load.remove(id);
            })
            .await?;

        self.discover()?;
        Ok(())
    }

    /// Pure config mutation; never loads or unloads anything. Disabling
    /// removes the key, since absence already means "no auto-load". No
    /// registry check: install sets this for packages that only become
    /// visible after the next refresh.
    pub async fn set_auto_load(&self, id: &str, value: bool) -> Result<(), PluginError> {
        let _guard = self.try_begin(id)?;
        self.state
            .update(|doc| {
                if value {
                    doc.auto_load.insert(id.to_string(), true);
                } else {
                    doc.auto_load.remove(id);
                }
            })
            .await
    }

    /// Startup driver: replay persisted auto-load state, one concurrent
    /// load per entry. Every outcome is logged on its own; one plugin's
    /// failure never keeps the others from loading.
    pub async fn autoload_all(self: &Arc<Self>) -> usize {
        let ids: Vec<String> = self
            .state
            .snapshot()
            .auto_load
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id.clone())
            .collect();

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids {
            let manager = Arc::clone(self);
            tasks.spawn(async move {
                let result = manager.load(&id);
                (id, result)
            });
        }

        let mut loaded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    tracing::info!("auto-loaded plugin '{}'", id);
                    loaded += 1;
                }
                Ok((id, Err(e))) => {
                    tracing::warn!("auto-load of plugin '{}' failed: {}", id, e);
                }
                Err(e) => {
                    tracing::error!("auto-load task failed: {}", e);
                }
            }
        }
        loaded
    }
}
