use async_trait::async_trait;

use crate::application::errors::BotError;

/// Where a command handler sends its human-readable status text.
///
/// A sink is scoped to the chat the triggering message came from, so
/// handlers only ever push text.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), BotError>;
}
