//! Shared-library module loader
//!
//! Production [`ModuleLoader`]: each plugin package is a directory holding a
//! `plugin.yaml` manifest and a cdylib exporting a `nami_plugin_init`
//! constructor. Probing reads only the manifest, so discovery never maps a
//! candidate's library or runs its code.

use libloading::{Library, Symbol};
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::errors::PluginError;
use crate::domain::entities::PluginMetadata;
use crate::domain::traits::{LoadedModule, ModuleLoader, Plugin};

/// Constructor every plugin library must export
pub type PluginCtor = extern "C" fn() -> *mut dyn Plugin;

pub const PLUGIN_CTOR_SYMBOL: &[u8] = b"nami_plugin_init";
pub const PLUGIN_MANIFEST_FILE: &str = "plugin.yaml";

pub struct DylibLoader {
    plugin_dir: PathBuf,
    builtin_dir: PathBuf,
}

impl DylibLoader {
    pub fn new(plugin_dir: impl Into<PathBuf>, builtin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            builtin_dir: builtin_dir.into(),
        }
    }

    /// Installed packages shadow built-ins with the same id
    fn package_dir(&self, id: &str) -> Option<PathBuf> {
        for base in [&self.plugin_dir, &self.builtin_dir] {
            let dir = base.join(id);
            if dir.is_dir() {
                return Some(dir);
            }
        }
        None
    }

    fn read_manifest(&self, id: &str) -> Result<(PathBuf, PluginMetadata), PluginError> {
        let dir = self
            .package_dir(id)
            .ok_or_else(|| PluginError::Load(format!("no package directory for '{}'", id)))?;
        let manifest_path = dir.join(PLUGIN_MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|e| PluginError::Load(format!("read {}: {}", manifest_path.display(), e)))?;
        let metadata: PluginMetadata = serde_yaml::from_str(&content)
            .map_err(|e| PluginError::Load(format!("parse {}: {}", manifest_path.display(), e)))?;
        Ok((dir, metadata))
    }
}

impl ModuleLoader for DylibLoader {
    fn probe(&self, id: &str) -> Result<PluginMetadata, PluginError> {
        self.read_manifest(id).map(|(_, metadata)| metadata)
    }

    fn source(&self, id: &str) -> Option<PathBuf> {
        self.package_dir(id)
    }

    fn load(&self, id: &str) -> Result<LoadedModule, PluginError> {
        let (dir, metadata) = self.read_manifest(id)?;

        let library_path = dir.join(format!("lib{}.so", metadata.name.replace('-', "_")));
        if !library_path.exists() {
            return Err(PluginError::Load(format!(
                "library not found: {}",
                library_path.display()
            )));
        }

        let library = unsafe {
            Library::new(&library_path)
                .map_err(|e| PluginError::Load(format!("open {}: {}", library_path.display(), e)))?
        };

        let ctor: Symbol<PluginCtor> = unsafe {
            library
                .get(PLUGIN_CTOR_SYMBOL)
                .map_err(|e| PluginError::Load(format!("missing constructor symbol: {}", e)))?
        };

        let instance: Arc<dyn Plugin> = unsafe {
            let raw = ctor();
            if raw.is_null() {
                return Err(PluginError::Load(
                    "plugin constructor returned null".to_string(),
                ));
            }
            Arc::from(Box::from_raw(raw))
        };

        tracing::debug!("opened {} for '{}'", library_path.display(), id);

        Ok(LoadedModule {
            metadata,
            instance,
            // The library must stay mapped while the instance is alive
            keepalive: Some(Box::new(library)),
        })
    }
}
