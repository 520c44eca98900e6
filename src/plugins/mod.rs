//! Plugin lifecycle management
//!
//! Discovery keeps an immutable registry snapshot of known plugins;
//! lifecycle operations mutate durable enabled/auto-load state and drive
//! the hook-gated host load/unload primitives; install and uninstall go
//! through the package manager bridge. One broken plugin never takes the
//! host down with it.

pub mod commands;
pub mod hooks;
pub mod host;
pub mod manager;
pub mod registry;

pub use hooks::{HookChain, HookContext, HookVerdict};
pub use host::PluginHost;
pub use manager::{DisableOutcome, EnableOutcome, InstallOutcome, PluginManager};
pub use registry::{Discoverer, PluginRegistry};
