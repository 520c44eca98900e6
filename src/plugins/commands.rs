//! Chat commands for plugin management
//!
//! Three admin-gated commands: `plugins` (list, optional refresh),
//! `plugin <action> <id>` and `autoload <id> <enable|disable>`. Every
//! lifecycle failure is rendered into the reply; nothing here propagates
//! an error past the dispatcher.

use std::sync::Arc;

use crate::application::errors::{BotError, CommandError, PluginError};
use crate::application::services::CommandService;
use crate::domain::entities::{Command, PluginStatus};
use crate::domain::traits::ReplySink;
use crate::plugins::manager::PluginManager;

pub fn register_plugin_commands(service: &mut CommandService, manager: Arc<PluginManager>) {
    let list_manager = Arc::clone(&manager);
    service.register(
        Command::new("plugins")
            .with_description("List known plugins")
            .with_usage("/plugins [-r|--refresh]")
            .admin_only()
            .with_handler(move |req, sink| {
                let manager = Arc::clone(&list_manager);
                async move {
                    let refresh = req.has_flag("r", "refresh");
                    let text = match manager.list(refresh) {
                        Ok(statuses) => render_list(&statuses, refresh),
                        Err(e) => format!("Failed to list plugins: {}", e),
                    };
                    send(&sink, &text).await
                }
            }),
    );

    let manage_manager = Arc::clone(&manager);
    service.register(
        Command::new("plugin")
            .with_description("Manage a plugin")
            .with_usage("/plugin <enable|disable|load|unload|install|uninstall> <id>")
            .admin_only()
            .with_handler(move |req, sink| {
                let manager = Arc::clone(&manage_manager);
                async move {
                    let (action, id) = match (req.args.first(), req.args.get(1)) {
                        (Some(action), Some(id)) => (action.clone(), id.clone()),
                        _ => {
                            return send(
                                &sink,
                                "Usage: /plugin <enable|disable|load|unload|install|uninstall> <id>",
                            )
                            .await;
                        }
                    };
                    handle_manage(&manager, &action, &id, &sink).await
                }
            }),
    );

    let autoload_manager = Arc::clone(&manager);
    service.register(
        Command::new("autoload")
            .with_description("Manage plugin auto-load at startup")
            .with_usage("/autoload <id> <enable|disable>")
            .admin_only()
            .with_handler(move |req, sink| {
                let manager = Arc::clone(&autoload_manager);
                async move {
                    let (id, action) = match (req.args.first(), req.args.get(1)) {
                        (Some(id), Some(action)) => (id.clone(), action.clone()),
                        _ => return send(&sink, "Usage: /autoload <id> <enable|disable>").await,
                    };

                    let value = match action.as_str() {
                        "enable" => true,
                        "disable" => false,
                        other => {
                            return send(
                                &sink,
                                &format!("Unknown auto-load action '{}', use enable or disable", other),
                            )
                            .await;
                        }
                    };

                    let text = match manager.set_auto_load(&id, value).await {
                        Ok(()) if value => format!("Auto-load enabled for plugin {}", id),
                        Ok(()) => format!("Auto-load disabled for plugin {}", id),
                        Err(e) => format!("Failed to update auto-load for {}: {}", id, e),
                    };
                    send(&sink, &text).await
                }
            }),
    );
}

async fn handle_manage(
    manager: &Arc<PluginManager>,
    action: &str,
    id: &str,
    sink: &Arc<dyn ReplySink>,
) -> Result<(), CommandError> {
    let text = match action {
        "enable" => match manager.enable(id).await {
            Ok(outcome) => match outcome.load_error {
                None => format!("Plugin {} enabled and loaded", id),
                Some(e) => format!("Plugin {} enabled, but loading failed: {}", id, e),
            },
            Err(e) => format!("Failed to enable {}: {}", id, e),
        },
        "disable" => match manager.disable(id).await {
            Ok(outcome) => match outcome.unload_error {
                None => format!("Plugin {} disabled and unloaded", id),
                Some(e) => format!("Plugin {} disabled, but unloading failed: {}", id, e),
            },
            Err(e) => format!("Failed to disable {}: {}", id, e),
        },
        "load" => match manager.load(id) {
            Ok(()) => format!("Plugin {} loaded", id),
            Err(PluginError::HookRejected { hook, .. }) => {
                format!("Plugin {} was blocked by load hook '{}'", id, hook)
            }
            Err(e) => format!("Failed to load {}: {}", id, e),
        },
        "unload" => match manager.unload(id) {
            Ok(()) => format!("Plugin {} unloaded", id),
            Err(e) => format!("Failed to unload {}: {}", id, e),
        },
        "install" => {
            send(sink, &format!("Installing {}, this can take a moment...", id)).await?;
            match manager.install(id).await {
                Ok(outcome) => match outcome.load_error {
                    None => format!("Plugin {} installed and loaded", id),
                    Some(e) => format!("Plugin {} installed, but loading failed: {}", id, e),
                },
                Err(e) => format!("Failed to install {}: {}", id, e),
            }
        }
        "uninstall" => {
            send(sink, &format!("Removing {}, unloading first...", id)).await?;
            match manager.uninstall(id).await {
                Ok(()) => format!("Plugin {} removed", id),
                Err(e) => format!("Failed to remove {}: {}", id, e),
            }
        }
        other => format!(
            "Unknown plugin action '{}', use enable/disable/load/unload/install/uninstall",
            other
        ),
    };
    send(sink, &text).await
}

fn render_list(statuses: &[PluginStatus], refreshed: bool) -> String {
    let mut out = format!(
        "{} plugins known{}:\n",
        statuses.len(),
        if refreshed { " (refreshed)" } else { "" }
    );
    for status in statuses {
        out.push_str(&format!(" - {} ({})", status.record.id, status.record.version));
        if let Some(desc) = &status.record.description {
            out.push_str(&format!(": {}", desc));
        }
        out.push('\n');
        out.push_str(&format!(
            "   - built-in: {}\n   - enabled: {}\n   - loaded: {}\n   - auto-load: {}\n",
            yes_no(status.record.built_in),
            yes_no(status.enabled),
            yes_no(status.loaded),
            yes_no(status.auto_load),
        ));
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

async fn send(sink: &Arc<dyn ReplySink>, text: &str) -> Result<(), CommandError> {
    sink.send(text).await.map_err(|e: BotError| {
        CommandError::ExecutionFailed(format!("failed to send reply: {}", e))
    })
}
