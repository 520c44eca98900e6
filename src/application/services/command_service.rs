use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::domain::entities::{Command, CommandRegistry, CommandRequest, Content, Message};
use crate::domain::traits::ReplySink;

/// Service for managing and dispatching commands
pub struct CommandService {
    registry: CommandRegistry,
    prefix: String,
    /// Users allowed to run admin-only commands; `None` allows everyone
    admins: Option<Vec<String>>,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            prefix: prefix.into(),
            admins: None,
        }
    }

    pub fn with_admins(mut self, admins: Vec<String>) -> Self {
        self.admins = Some(admins);
        self
    }

    pub fn register(&mut self, command: Command) {
        self.registry.register(command);
    }

    pub fn register_defaults(&mut self) {
        self.register(
            Command::new("version")
                .with_description("Show bot version")
                .with_aliases(vec!["ver".to_string()])
                .with_handler(|_req, sink| async move {
                    sink.send(concat!("nami-bot v", env!("CARGO_PKG_VERSION")))
                        .await
                        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
                }),
        );
    }

    /// Register the help command. Call this last, after everything else is
    /// registered, so the listing is complete.
    pub fn register_help(&mut self) {
        let mut listing = "Available commands:\n".to_string();
        let mut lines: Vec<String> = self
            .registry
            .all()
            .map(|cmd| {
                format!(
                    "  {}{} - {}",
                    self.prefix,
                    cmd.name,
                    cmd.description.as_deref().unwrap_or("")
                )
            })
            .collect();
        lines.sort();
        listing.push_str(&lines.join("\n"));

        self.register(
            Command::new("help")
                .with_description("Show this message")
                .with_handler(move |_req, sink| {
                    let listing = listing.clone();
                    async move {
                        sink.send(&listing)
                            .await
                            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
                    }
                }),
        );
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Split a command message into positional args and flags
    fn parse_request(&self, message: &Message) -> Option<CommandRequest> {
        let Content::Command { name, args } = &message.content else {
            return None;
        };

        let mut positional = Vec::new();
        let mut flags = Vec::new();
        for arg in args {
            if let Some(flag) = arg.strip_prefix("--") {
                flags.push(flag.to_string());
            } else if let Some(flag) = arg.strip_prefix('-') {
                flags.push(flag.to_string());
            } else {
                positional.push(arg.clone());
            }
        }

        Some(CommandRequest {
            chat_id: message.chat_id.clone(),
            sender_id: message.sender_id().to_string(),
            name: name.clone(),
            args: positional,
            flags,
        })
    }

    fn is_admin(&self, user_id: &str) -> bool {
        match &self.admins {
            None => true,
            Some(admins) => admins.iter().any(|a| a == user_id),
        }
    }

    /// Dispatch a command message; replies go through the sink
    pub async fn handle(
        &self,
        message: &Message,
        sink: Arc<dyn ReplySink>,
    ) -> Result<(), CommandError> {
        let Some(request) = self.parse_request(message) else {
            return Ok(());
        };

        let command = self
            .registry
            .find(&request.name)
            .ok_or_else(|| CommandError::NotFound(request.name.clone()))?;

        if command.admin_only && !self.is_admin(&request.sender_id) {
            return Err(CommandError::PermissionDenied);
        }

        match &command.handler {
            Some(handler) => handler(request, sink).await,
            None => Err(CommandError::ExecutionFailed(format!(
                "command {} has no handler",
                command.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::BotError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), BotError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn flags_are_split_from_positional_args() {
        let mut service = CommandService::new("/");
        service.register(Command::new("probe").with_handler(|req, sink| async move {
            assert_eq!(req.args, vec!["target"]);
            assert_eq!(req.flags, vec!["refresh"]);
            sink.send("ok").await.unwrap();
            Ok(())
        }));

        let msg = Message::from_command(
            "chat-1",
            "probe",
            vec!["--refresh".to_string(), "target".to_string()],
        );
        let sink = RecordingSink::new();
        service.handle(&msg, sink.clone()).await.unwrap();
        assert_eq!(sink.sent.lock().unwrap().as_slice(), ["ok"]);
    }

    #[tokio::test]
    async fn admin_commands_require_whitelisted_sender() {
        let mut service = CommandService::new("/").with_admins(vec!["42".to_string()]);
        service.register(
            Command::new("secret")
                .admin_only()
                .with_handler(|_req, sink| async move {
                    sink.send("done").await.unwrap();
                    Ok(())
                }),
        );

        let msg = Message::from_command("1337", "secret", vec![]);
        let sink = RecordingSink::new();
        assert!(matches!(
            service.handle(&msg, sink.clone()).await,
            Err(CommandError::PermissionDenied)
        ));

        let msg = Message::from_command("42", "secret", vec![]);
        service.handle(&msg, sink.clone()).await.unwrap();
        assert_eq!(sink.sent.lock().unwrap().as_slice(), ["done"]);
    }

    #[tokio::test]
    async fn help_lists_registered_commands() {
        let mut service = CommandService::new("/");
        service.register_defaults();
        service.register(Command::new("probe").with_description("Probe things"));
        service.register_help();

        let sink = RecordingSink::new();
        let msg = Message::from_command("chat-1", "help", vec![]);
        service.handle(&msg, sink.clone()).await.unwrap();

        let sent = sink.sent.lock().unwrap();
        assert!(sent[0].contains("/probe - Probe things"));
        assert!(sent[0].contains("/version - Show bot version"));
    }

    #[tokio::test]
    async fn aliases_resolve_to_the_same_command() {
        let mut service = CommandService::new("/");
        service.register_defaults();

        let sink = RecordingSink::new();
        let msg = Message::from_command("chat-1", "ver", vec![]);
        service.handle(&msg, sink.clone()).await.unwrap();
        assert!(sink.sent.lock().unwrap()[0].starts_with("nami-bot v"));
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let service = CommandService::new("/");
        let msg = Message::from_command("chat-1", "nope", vec![]);
        assert!(matches!(
            service.handle(&msg, RecordingSink::new()).await,
            Err(CommandError::NotFound(_))
        ));
    }
}
