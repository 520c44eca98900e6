//! Domain entities - Core business objects

pub mod command;
pub mod message;
pub mod plugin;
pub mod user;

pub use command::{Command, CommandRegistry, CommandRequest};
pub use message::{Content, Message};
pub use plugin::{PluginMetadata, PluginRecord, PluginStatus};
pub use user::User;
