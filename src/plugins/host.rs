//! Host API - brings modules in and out of the running process
//!
//! Load requests are gated by the hook chain; the loading mechanism itself
//! is whatever [`ModuleLoader`] was wired in.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::application::errors::PluginError;
use crate::domain::traits::{LoadedModule, ModuleLoader};
use crate::plugins::hooks::{HookChain, HookContext, HookVerdict};

pub struct PluginHost {
    loader: Arc<dyn ModuleLoader>,
    loaded: RwLock<HashMap<String, LoadedModule>>,
    hooks: RwLock<HookChain>,
}

impl PluginHost {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            loaded: RwLock::new(HashMap::new()),
            hooks: RwLock::new(HookChain::new()),
        }
    }

    /// Register a load-gating hook. Names are unique across the chain.
    pub fn register_load_hook<F>(
        &self,
        name: impl Into<String>,
        predicate: F,
    ) -> Result<(), PluginError>
    where
        F: Fn(&HookContext) -> bool + Send + Sync + 'static,
    {
        let mut hooks = self
            .hooks
            .write()
            .map_err(|_| PluginError::Internal("hook lock poisoned".to_string()))?;
        hooks.register(name, predicate)
    }

    /// Load a module into the host. Loading an already-loaded module is a
    /// no-op success; a hook rejection is `HookRejected`.
    pub fn load_module(&self, id: &str) -> Result<(), PluginError> {
        if self.is_loaded(id) {
            return Ok(());
        }

        let verdict = {
            let hooks = self
                .hooks
                .read()
                .map_err(|_| PluginError::Internal("hook lock poisoned".to_string()))?;
            hooks.evaluate(&HookContext {
                plugin_id: id.to_string(),
            })
        };
        if let HookVerdict::Blocked { hook } = verdict {
            return Err(PluginError::HookRejected {
                id: id.to_string(),
                hook,
            });
        }

        let module = self.loader.load(id)?;
        module
            .instance
            .init()
            .map_err(|e| PluginError::Load(format!("init of '{}' failed: {}", id, e)))?;

        let mut loaded = self
            .loaded
            .write()
            .map_err(|_| PluginError::Internal("loaded-module lock poisoned".to_string()))?;
        loaded.insert(id.to_string(), module);
        tracing::info!("loaded plugin '{}'", id);
        Ok(())
    }

    /// Unload a module. Unloading something that is not loaded is a no-op
    /// success. The module is dropped even when its shutdown fails; the
    /// failure is reported to the caller.
    pub fn unload_module(&self, id: &str) -> Result<(), PluginError> {
        let module = {
            let mut loaded = self
                .loaded
                .write()
                .map_err(|_| PluginError::Internal("loaded-module lock poisoned".to_string()))?;
            loaded.remove(id)
        };

        let Some(module) = module else {
            return Ok(());
        };

        let result = module
            .instance
            .shutdown()
            .map_err(|e| PluginError::Load(format!("shutdown of '{}' failed: {}", id, e)));
        tracing::info!("unloaded plugin '{}'", id);
        result
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded
            .read()
            .map(|l| l.contains_key(id))
            .unwrap_or(false)
    }

    pub fn loaded_ids(&self) -> Vec<String> {
        self.loaded
            .read()
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default()
    }
}
