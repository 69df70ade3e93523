//! Leverage calculator bot front-ends
//!
//! Wires [`leverage_core::LeverageBot`] to the outside world:
//!
//! - [`server`]: the axum webhook server Telegram posts updates to
//! - [`platforms::telegram`]: Bot API configuration and client
//! - [`platforms::cli`]: a local REPL over stdin/stdout
//! - [`rate_limit`]: per-sender message throttling

pub mod error;
pub mod platforms;
pub mod rate_limit;
pub mod server;

pub use error::{BotError, Result};
pub use platforms::{CliBot, MessageSender, TelegramClient, TelegramConfig};
pub use rate_limit::SenderRateLimiter;
pub use server::{AppState, create_router};
