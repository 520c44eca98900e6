//! Console adapter for development/testing

use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::traits::ReplySink;

/// Reads lines from stdin for the local development loop
pub struct ConsoleAdapter;

impl ConsoleAdapter {
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        use std::io::Write;
        print!("{}", prompt);
        std::io::stdout().flush().ok()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok()?;
        if input.is_empty() {
            return None; // EOF
        }
        Some(input.trim().to_string())
    }
}

/// Reply sink writing straight to stdout
pub struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, text: &str) -> Result<(), BotError> {
        println!("[BOT] {}", text);
        Ok(())
    }
}
