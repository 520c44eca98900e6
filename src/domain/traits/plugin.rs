//! Plugin capability trait and the loading seam
//!
//! The host depends only on these interfaces; whether a module comes from a
//! shared library, a link-time registry, or anything else is the loader's
//! business.

use std::any::Any;
use std::sync::Arc;

use crate::application::errors::PluginError;
use crate::domain::entities::PluginMetadata;

/// Executable logic identified by a string key, loadable without
/// recompiling the host.
pub trait Plugin: Send + Sync {
    /// Initialize the plugin into the running host
    fn init(&self) -> Result<(), PluginError>;

    /// Release resources before the module is dropped
    fn shutdown(&self) -> Result<(), PluginError>;

    /// Name, version, description
    fn metadata(&self) -> PluginMetadata;
}

/// A fully loaded module.
///
/// `keepalive` pins whatever backs the instance (for the dylib loader, the
/// mapped library) for as long as the module stays loaded.
pub struct LoadedModule {
    pub metadata: PluginMetadata,
    pub instance: Arc<dyn Plugin>,
    pub keepalive: Option<Box<dyn Any + Send + Sync>>,
}

/// Resolves a plugin id to metadata or a live module.
pub trait ModuleLoader: Send + Sync {
    /// Fetch metadata without initializing the plugin. Used by discovery;
    /// a failure here skips the candidate, nothing more.
    fn probe(&self, id: &str) -> Result<PluginMetadata, PluginError>;

    /// Resolve the source location for an id, when known
    fn source(&self, id: &str) -> Option<std::path::PathBuf>;

    /// Bring the module into the process
    fn load(&self, id: &str) -> Result<LoadedModule, PluginError>;
}
