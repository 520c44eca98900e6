//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub plugins: PluginsConfig,
    pub package_manager: PackageManagerConfig,
    pub whitelist: WhitelistConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginsConfig {
    /// Installed plugin packages live here, one directory per package
    pub directory: PathBuf,
    /// Plugins shipped with the host
    pub builtin_directory: PathBuf,
    /// Durable enabled/auto-load state
    pub state_file: PathBuf,
    /// Package naming convention for manifest candidates
    pub naming_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManagerConfig {
    /// Preferred binary, probed with its version flag on every call
    pub program: String,
    /// Wrapper used when the preferred binary is not available,
    /// e.g. `npx` to run `npx pnpm ...`
    pub fallback_runner: String,
    /// Directory holding the host package manifest; subprocess cwd
    pub package_root: PathBuf,
}

/// Whitelist configuration for user access control
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WhitelistConfig {
    pub enabled: bool,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdaptersConfig {
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "nami-bot".to_string(),
                prefix: "/".to_string(),
            },
            plugins: PluginsConfig {
                directory: PathBuf::from("./plugins"),
                builtin_directory: PathBuf::from("./builtin-plugins"),
                state_file: PathBuf::from("./plugin-state.yaml"),
                naming_prefix: "nami-plugin-".to_string(),
            },
            package_manager: PackageManagerConfig {
                program: "pnpm".to_string(),
                fallback_runner: "npx".to_string(),
                package_root: PathBuf::from("."),
            },
            whitelist: WhitelistConfig {
                enabled: false,
                users: Vec::new(),
            },
            adapters: AdaptersConfig {
                console: Some(ConsoleConfig { enabled: true }),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            config.bot.prefix = prefix;
        }
        if let Ok(dir) = std::env::var("BOT_PLUGIN_DIR") {
            config.plugins.directory = PathBuf::from(dir);
        }

        config
    }
}
