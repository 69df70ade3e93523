//! Platform-specific front-ends

pub mod cli;
pub mod telegram;

use crate::error::Result;
use async_trait::async_trait;
use leverage_core::BotReply;

pub use cli::CliBot;
pub use telegram::{TelegramClient, TelegramConfig};

/// Outbound half of a chat transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `reply` to the chat identified by `chat_id`
    async fn send_message(&self, chat_id: i64, reply: BotReply) -> Result<()>;
}
