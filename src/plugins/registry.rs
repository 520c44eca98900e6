//! Plugin registry and discovery
//!
//! The registry is an immutable snapshot: discovery builds a complete new
//! map and installs it with one `Arc` swap, so readers always see either
//! the prior snapshot or the new one, never a mix.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::application::errors::PluginError;
use crate::domain::entities::PluginRecord;
use crate::domain::traits::ModuleLoader;
use crate::infrastructure::manifest::ManifestReader;

pub type RegistrySnapshot = BTreeMap<String, PluginRecord>;

pub struct PluginRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }

    /// The current complete snapshot
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .map(|s| Arc::clone(&s))
            .unwrap_or_default()
    }

    pub fn lookup(&self, id: &str) -> Result<PluginRecord, PluginError> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    /// Atomically replace the snapshot
    pub fn install(&self, next: RegistrySnapshot) -> Result<(), PluginError> {
        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|_| PluginError::Internal("registry lock poisoned".to_string()))?;
        *snapshot = Arc::new(next);
        Ok(())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds registry snapshots from manifest and plugin-directory candidates
pub struct Discoverer {
    manifest: Arc<dyn ManifestReader>,
    loader: Arc<dyn ModuleLoader>,
    builtin_dir: PathBuf,
}

impl Discoverer {
    pub fn new(
        manifest: Arc<dyn ManifestReader>,
        loader: Arc<dyn ModuleLoader>,
        builtin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest,
            loader,
            builtin_dir: builtin_dir.into(),
        }
    }

    /// Probe every candidate and return the records that answered.
    ///
    /// A failing candidate is logged and skipped; it never aborts the
    /// refresh. A failing candidate source counts as empty.
    pub fn build_snapshot(&self) -> RegistrySnapshot {
        let mut candidates = BTreeSet::new();

        match self.manifest.dependency_ids() {
            Ok(ids) => candidates.extend(ids),
            Err(e) => tracing::warn!("failed to read host manifest: {}", e),
        }
        match self.manifest.plugin_dir_ids() {
            Ok(ids) => candidates.extend(ids),
            Err(e) => tracing::warn!("failed to list plugin directory: {}", e),
        }

        let mut records = BTreeMap::new();
        for id in candidates {
            let metadata = match self.loader.probe(&id) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("skipping plugin candidate '{}': {}", id, e);
                    continue;
                }
            };
            let source = self.loader.source(&id).unwrap_or_default();
            let built_in = source.starts_with(&self.builtin_dir);
            records.insert(
                id.clone(),
                PluginRecord {
                    id,
                    version: metadata.version,
                    description: metadata.description,
                    source,
                    built_in,
                },
            );
        }
        records
    }
}
