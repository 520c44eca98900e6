use clap::{Parser, Subcommand};
use std::sync::Arc;

use nami_bot::application::services::CommandService;
use nami_bot::domain::entities::{Message, User};
use nami_bot::domain::traits::ReplySink;
use nami_bot::infrastructure::adapters::console::{ConsoleAdapter, ConsoleSink};
use nami_bot::infrastructure::config::Config;
use nami_bot::infrastructure::loader::DylibLoader;
use nami_bot::infrastructure::manifest::PackageManifestReader;
use nami_bot::infrastructure::package_manager::PnpmBridge;
use nami_bot::infrastructure::state::PluginStateStore;
use nami_bot::plugins::commands::register_plugin_commands;
use nami_bot::plugins::{Discoverer, PluginHost, PluginManager};

#[derive(Parser)]
#[command(name = "nami-bot")]
#[command(about = "A minimal bot host with hot-pluggable functionality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_bot(cli.config),
        Commands::Version => {
            println!("nami-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => init_config(cli.config),
    }
}

fn init_config(path: String) {
    match serde_yaml::to_string(&Config::default()) {
        Ok(content) => {
            if let Err(e) = std::fs::write(&path, content) {
                tracing::error!("Failed to write {}: {}", path, e);
            } else {
                println!("Wrote default config to {}", path);
            }
        }
        Err(e) => tracing::error!("Failed to serialize default config: {}", e),
    }
}

fn run_bot(config_path: String) {
    // Load config
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    tracing::info!("Starting nami-bot: {}", config.bot.name);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return;
        }
    };

    rt.block_on(async {
        // Wire the plugin subsystem
        let state = match PluginStateStore::open(&config.plugins.state_file) {
            Ok(state) => Arc::new(state),
            Err(e) => {
                tracing::error!("Failed to open plugin state store: {}", e);
                return;
            }
        };
        let loader = Arc::new(DylibLoader::new(
            &config.plugins.directory,
            &config.plugins.builtin_directory,
        ));
        let host = Arc::new(PluginHost::new(loader.clone()));
        let manifest = Arc::new(PackageManifestReader::new(
            &config.package_manager.package_root,
            &config.plugins.directory,
            &config.plugins.naming_prefix,
        ));
        let bridge = Arc::new(PnpmBridge::new(
            &config.package_manager.program,
            &config.package_manager.fallback_runner,
            &config.package_manager.package_root,
        ));
        let discoverer = Discoverer::new(manifest, loader, &config.plugins.builtin_directory);

        let manager = match PluginManager::new(host, state, bridge, discoverer) {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                tracing::error!("Failed to build plugin manager: {}", e);
                return;
            }
        };

        match manager.discover() {
            Ok(count) => tracing::info!("Discovered {} plugins", count),
            Err(e) => tracing::warn!("Initial plugin discovery failed: {}", e),
        }

        let loaded = manager.autoload_all().await;
        tracing::info!(
            "Auto-loaded {} plugins: {}",
            loaded,
            manager.host().loaded_ids().join(", ")
        );

        // Command service
        let mut commands = CommandService::new(&config.bot.prefix);
        if config.whitelist.enabled {
            commands = commands.with_admins(config.whitelist.users.clone());
        }
        commands.register_defaults();
        register_plugin_commands(&mut commands, Arc::clone(&manager));
        commands.register_help();

        let console_enabled = config
            .adapters
            .console
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(true);
        if console_enabled {
            run_console_bot(commands).await;
        } else {
            tracing::warn!("No adapter enabled, nothing to do");
        }
    });
}

async fn run_console_bot(commands: CommandService) {
    let console = ConsoleAdapter;
    let sink: Arc<dyn ReplySink> = Arc::new(ConsoleSink);

    tracing::info!("Console mode, type {}help for commands", commands.prefix());

    loop {
        let Some(line) = console.read_line("> ").await else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let msg = if let Some(rest) = line.strip_prefix(commands.prefix()) {
            let mut parts = rest.split_whitespace();
            let name = parts.next().unwrap_or("").to_string();
            let args: Vec<String> = parts.map(|s| s.to_string()).collect();
            Message::from_command("console", name, args)
        } else {
            Message::from_text("console", line)
        }
        .with_sender(User::new("console"))
        .with_platform("console");

        if msg.content.is_command() {
            if let Err(e) = commands.handle(&msg, Arc::clone(&sink)).await {
                println!("[BOT] Error: {}", e);
            }
        } else if let Some(text) = msg.content.text() {
            println!("[BOT] Echo: {}", text);
        }
    }
}
