//! Plugin records as seen by the registry

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata a plugin package declares about itself.
///
/// This is what a probe load yields: enough to list the plugin without
/// initializing it into the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

/// A known plugin in the current registry snapshot.
///
/// `id` is unique within a snapshot. The record is immutable; persisted
/// state (enabled/auto-load) and transient load state are annotated at
/// read time, see [`PluginStatus`].
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    /// Where the plugin package lives on disk
    pub source: PathBuf,
    /// Derived from the source path: shipped with the host rather than installed
    pub built_in: bool,
}

/// A [`PluginRecord`] annotated with its current lifecycle state
#[derive(Debug, Clone)]
pub struct PluginStatus {
    pub record: PluginRecord,
    pub enabled: bool,
    pub auto_load: bool,
    pub loaded: bool,
}
