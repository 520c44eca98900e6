//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod plugin;

pub use bot::ReplySink;
pub use plugin::{LoadedModule, ModuleLoader, Plugin};
