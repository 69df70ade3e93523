//! Command parsing for the leverage bot

/// Parsed user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) a calculation
    Start,
    /// Show usage instructions
    Help,
    /// Abandon the current calculation
    Cancel,
    /// A slash command the bot does not know
    Unknown { name: String },
    /// Anything that is not a command, i.e. an answer to the current prompt
    Value { text: String },
}

impl Command {
    /// Parse a command from user input
    ///
    /// Telegram appends `@BotName` to commands in group chats; the suffix is
    /// ignored. Arguments after the command are ignored too.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        let Some(rest) = input.strip_prefix('/') else {
            return Command::Value {
                text: input.to_string(),
            };
        };

        let word = rest.split_whitespace().next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default().to_lowercase();

        match name.as_str() {
            "start" | "new" | "restart" => Command::Start,
            "help" | "h" | "?" => Command::Help,
            "cancel" | "stop" | "reset" => Command::Cancel,
            _ => Command::Unknown { name },
        }
    }
}
