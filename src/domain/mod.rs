//! Domain layer - Core business objects with no external dependencies
//!
//! This layer contains:
//! - Entities: Core business objects (User, Message, Command, PluginRecord)
//! - Traits: Abstractions for infrastructure (Bot, ReplySink, Plugin, ModuleLoader)

pub mod entities;
pub mod traits;
