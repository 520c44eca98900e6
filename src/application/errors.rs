//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Plugin lifecycle errors
///
/// Every lifecycle operation returns one of these instead of panicking;
/// nothing here ever propagates past the command layer.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin '{0}' does not exist")]
    NotFound(String),

    #[error("plugin '{id}' is already {state}")]
    AlreadyInState { id: String, state: &'static str },

    #[error("plugin '{0}' has another operation in progress")]
    Busy(String),

    #[error("load of '{id}' blocked by hook '{hook}'")]
    HookRejected { id: String, hook: String },

    #[error("load hook '{0}' is already registered")]
    DuplicateHook(String),

    #[error("failed to spawn package manager: {0}")]
    SpawnFailed(String),

    #[error("package manager exited with code {code}: {stderr}")]
    PackageManagerFailed { code: i32, stderr: String },

    #[error("failed to persist plugin state: {0}")]
    Persist(String),

    #[error("plugin load failed: {0}")]
    Load(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
