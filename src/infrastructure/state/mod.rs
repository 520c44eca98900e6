//! Durable plugin state - the enabled and auto-load maps
//!
//! The store keeps the whole document in memory for synchronous reads (the
//! load hook runs inside the host's load path and cannot await) and writes
//! the full document to disk before committing any mutation to memory. An
//! operation that cannot persist reports failure with memory unchanged, so
//! a plugin is never "enabled in memory but not on disk".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::application::errors::PluginError;

/// The persisted document: two id -> bool maps.
///
/// A missing key means "use the default": enabled defaults to true,
/// auto-load defaults to false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginStateDoc {
    pub enabled: BTreeMap<String, bool>,
    pub auto_load: BTreeMap<String, bool>,
}

impl PluginStateDoc {
    pub fn enabled(&self, id: &str) -> bool {
        self.enabled.get(id).copied().unwrap_or(true)
    }

    pub fn auto_load(&self, id: &str) -> bool {
        self.auto_load.get(id).copied().unwrap_or(false)
    }
}

/// YAML-file-backed plugin state store
pub struct PluginStateStore {
    path: PathBuf,
    doc: RwLock<PluginStateDoc>,
    // Serializes mutate-then-persist sequences; reads never wait on it
    write_lock: tokio::sync::Mutex<()>,
}

impl PluginStateStore {
    /// Open the store, reading the existing state file if there is one
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PluginError> {
        let path = path.into();
        let doc = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| PluginError::Persist(format!("read {}: {}", path.display(), e)))?;
            serde_yaml::from_str(&content)
                .map_err(|e| PluginError::Persist(format!("parse {}: {}", path.display(), e)))?
        } else {
            PluginStateDoc::default()
        };

        Ok(Self {
            path,
            doc: RwLock::new(doc),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn enabled(&self, id: &str) -> bool {
        self.doc.read().map(|d| d.enabled(id)).unwrap_or(true)
    }

    pub fn auto_load(&self, id: &str) -> bool {
        self.doc.read().map(|d| d.auto_load(id)).unwrap_or(false)
    }

    /// Current document
    pub fn snapshot(&self) -> PluginStateDoc {
        self.doc.read().map(|d| d.clone()).unwrap_or_default()
    }

    /// Apply a mutation: clone the document, run `f`, persist the result,
    /// then commit it to memory. Disk first; a persist failure leaves the
    /// in-memory document at its prior value.
    pub async fn update<F>(&self, f: F) -> Result<(), PluginError>
    where
        F: FnOnce(&mut PluginStateDoc),
    {
        let _guard = self.write_lock.lock().await;

        let mut next = self.snapshot();
        f(&mut next);

        let content = serde_yaml::to_string(&next)
            .map_err(|e| PluginError::Persist(format!("serialize state: {}", e)))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| PluginError::Persist(format!("write {}: {}", self.path.display(), e)))?;

        let mut doc = self
            .doc
            .write()
            .map_err(|_| PluginError::Internal("state lock poisoned".to_string()))?;
        *doc = next;
        Ok(())
    }
}
