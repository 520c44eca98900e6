//! Host package manifest and plugin directory reader
//!
//! Discovery candidates come from two places: dependency entries in the
//! host's package manifest that follow the plugin naming convention, and
//! directories under the plugins directory.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::application::errors::PluginError;

/// Enumerates candidate plugin identifiers
pub trait ManifestReader: Send + Sync {
    /// Declared dependency ids matching the plugin naming convention
    fn dependency_ids(&self) -> Result<Vec<String>, PluginError>;

    /// Ids of packages present in the plugins directory
    fn plugin_dir_ids(&self) -> Result<Vec<String>, PluginError>;
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

/// Reads `package.json` at the package root and lists the plugins directory
pub struct PackageManifestReader {
    package_root: PathBuf,
    plugin_dir: PathBuf,
    naming_prefix: String,
}

impl PackageManifestReader {
    pub fn new(
        package_root: impl Into<PathBuf>,
        plugin_dir: impl Into<PathBuf>,
        naming_prefix: impl Into<String>,
    ) -> Self {
        Self {
            package_root: package_root.into(),
            plugin_dir: plugin_dir.into(),
            naming_prefix: naming_prefix.into(),
        }
    }
}

impl ManifestReader for PackageManifestReader {
    fn dependency_ids(&self) -> Result<Vec<String>, PluginError> {
        let path = self.package_root.join("package.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| PluginError::Load(format!("read {}: {}", path.display(), e)))?;
        let manifest: PackageManifest = serde_json::from_str(&content)
            .map_err(|e| PluginError::Load(format!("parse {}: {}", path.display(), e)))?;

        let ids = manifest
            .dependencies
            .keys()
            .chain(manifest.dev_dependencies.keys())
            .filter(|name| name.contains(&self.naming_prefix))
            .cloned()
            .collect();
        Ok(ids)
    }

    fn plugin_dir_ids(&self) -> Result<Vec<String>, PluginError> {
        if !self.plugin_dir.exists() {
            tracing::debug!(
                "plugin directory {} does not exist",
                self.plugin_dir.display()
            );
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.plugin_dir).map_err(|e| {
            PluginError::Load(format!("read {}: {}", self.plugin_dir.display(), e))
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("failed to read plugin directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    continue;
                }
                ids.push(name.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_dependencies_by_naming_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{
                "dependencies": {
                    "nami-plugin-ping": "^1.0.0",
                    "left-pad": "1.3.0"
                },
                "devDependencies": {
                    "nami-plugin-dev": "^0.1.0"
                }
            }"#,
        )
        .unwrap();

        let reader =
            PackageManifestReader::new(dir.path(), dir.path().join("plugins"), "nami-plugin-");
        let mut ids = reader.dependency_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["nami-plugin-dev", "nami-plugin-ping"]);
    }

    #[test]
    fn missing_plugin_dir_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader =
            PackageManifestReader::new(dir.path(), dir.path().join("nope"), "nami-plugin-");
        assert!(reader.plugin_dir_ids().unwrap().is_empty());
    }

    #[test]
    fn lists_plugin_directories_skipping_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        std::fs::create_dir_all(plugins.join("nami-plugin-ping")).unwrap();
        std::fs::create_dir_all(plugins.join(".cache")).unwrap();
        std::fs::write(plugins.join("stray-file"), "x").unwrap();

        let reader = PackageManifestReader::new(dir.path(), &plugins, "nami-plugin-");
        assert_eq!(reader.plugin_dir_ids().unwrap(), vec!["nami-plugin-ping"]);
    }
}
