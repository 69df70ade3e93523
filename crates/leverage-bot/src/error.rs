//! Error types for the bot front-ends

use leverage_core::LeverageError;
use leverage_utils::EnvVarError;
use thiserror::Error;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Telegram answered `ok: false`
    #[error("Telegram API error in {method}: {description}")]
    TelegramApi { method: String, description: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Terminal or socket I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the wizard core
    #[error(transparent)]
    Core(#[from] LeverageError),
}

impl From<EnvVarError> for BotError {
    fn from(err: EnvVarError) -> Self {
        BotError::ConfigError(err.to_string())
    }
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;
