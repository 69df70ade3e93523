//! Reply type returned for every inbound message

use serde::{Deserialize, Serialize};

/// Type of bot reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    /// Plain text
    Text,

    /// Markdown formatted text
    Formatted,

    /// Validation or calculation failure, plain text
    Error,
}

/// A single reply to send back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotReply {
    /// Reply content
    pub content: String,

    /// Reply type
    pub response_type: ResponseType,
}

impl BotReply {
    /// Create a simple text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            response_type: ResponseType::Text,
        }
    }

    /// Create a Markdown reply
    pub fn formatted(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            response_type: ResponseType::Formatted,
        }
    }

    /// Create an error reply
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            response_type: ResponseType::Error,
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.response_type == ResponseType::Formatted
    }

    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }
}

impl std::fmt::Display for BotReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}
