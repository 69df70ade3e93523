//! Terminal front-end
//!
//! Drives the same wizard as the webhook from stdin, for local testing
//! without a Telegram token.

use crate::error::Result;
use leverage_core::{BotReply, LeverageBot};
use std::io::{BufRead, Write};

/// Sender id used for the single local conversation
pub const LOCAL_USER_ID: &str = "local";

const PROMPT: &str = "> ";

/// Interactive REPL over any reader and writer
pub struct CliBot {
    bot: LeverageBot,
    user_id: String,
}

impl CliBot {
    pub fn new(bot: LeverageBot) -> Self {
        Self {
            bot,
            user_id: LOCAL_USER_ID.to_string(),
        }
    }

    pub fn bot(&self) -> &LeverageBot {
        &self.bot
    }

    /// Run until EOF or `/exit`
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        let greeting = self.bot.process_input(&self.user_id, "/start");
        write_reply(&mut output, &greeting)?;

        let mut line = String::new();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output, "\nGoodbye!")?;
                break;
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if matches!(text, "/exit" | "/quit") {
                writeln!(output, "Goodbye!")?;
                break;
            }

            let reply = self.bot.process_input(&self.user_id, text);
            write_reply(&mut output, &reply)?;
        }

        Ok(())
    }
}

fn write_reply<W: Write>(output: &mut W, reply: &BotReply) -> Result<()> {
    let text = if reply.is_markdown() {
        reply.content.replace('*', "")
    } else {
        reply.content.clone()
    };
    writeln!(output, "{text}\n")?;
    Ok(())
}
