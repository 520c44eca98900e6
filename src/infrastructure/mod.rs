//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Host configuration loading
//! - State: Durable plugin enabled/auto-load state
//! - Manifest: Host package manifest and plugin directory reader
//! - PackageManager: install/remove subprocess bridge
//! - Loader: shared-library module loader
//! - Adapters: Platform integrations

pub mod adapters;
pub mod config;
pub mod loader;
pub mod manifest;
pub mod package_manager;
pub mod state;
