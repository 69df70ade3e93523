//! Leverage Calculator Bot
//!
//! # Usage
//!
//! ```bash
//! # Telegram webhook mode
//! export TELEGRAM_BOT_TOKEN="123456:ABC..."
//! export WEBHOOK_SECRET="some_random_secret"
//! export WEBHOOK_URL="https://bot.example.com"
//! cargo run --bin leverage-bot -- serve
//!
//! # Local terminal session
//! cargo run --bin leverage-bot -- repl
//! ```

use clap::{Parser, Subcommand};
use leverage_bot::platforms::CliBot;
use leverage_bot::server::{self, AppState, SWEEP_INTERVAL};
use leverage_bot::{SenderRateLimiter, TelegramClient, TelegramConfig};
use leverage_core::{LeverageBot, WizardConfig};
use std::io;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "leverage-bot", version, about = "Telegram leverage calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the Telegram webhook server
    Serve {
        /// Override the PORT environment variable
        #[arg(long)]
        port: Option<u16>,

        /// Do not (re)register the webhook with Telegram on startup
        #[arg(long)]
        skip_webhook_setup: bool,
    },
    /// Chat with the bot in the terminal
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    leverage_utils::init_tracing();

    let cli = Cli::parse();
    let wizard_config = WizardConfig::from_env()?;

    match cli.command {
        Command::Serve {
            port,
            skip_webhook_setup,
        } => serve(wizard_config, port, skip_webhook_setup).await,
        Command::Repl => {
            let bot = CliBot::new(LeverageBot::new(wizard_config));
            bot.run(io::stdin().lock(), io::stdout())?;
            Ok(())
        }
    }
}

async fn serve(
    wizard_config: WizardConfig,
    port: Option<u16>,
    skip_webhook_setup: bool,
) -> anyhow::Result<()> {
    let mut telegram_config = TelegramConfig::from_env()?;
    if let Some(port) = port {
        telegram_config.port = port;
    }
    info!(config = ?telegram_config, "Starting webhook mode");

    let client = TelegramClient::new(telegram_config.clone())?;
    if skip_webhook_setup {
        info!("Skipping webhook registration");
    } else {
        if let Err(e) = client.delete_webhook().await {
            warn!(error = %e, "Could not remove existing webhook");
        }
        if let Err(e) = client.set_webhook().await {
            warn!(error = %e, "Webhook registration failed, serving anyway");
        }
    }

    let bot = Arc::new(LeverageBot::new(wizard_config));
    let limiter = Arc::new(SenderRateLimiter::per_minute(
        telegram_config.rate_limit_per_minute,
    ));
    let sweeper = server::spawn_session_sweeper(
        Arc::clone(bot.store()),
        Arc::clone(&limiter),
        SWEEP_INTERVAL,
    );

    let state = AppState::new(
        bot,
        Arc::new(client),
        limiter,
        telegram_config.webhook_secret.as_str(),
    );
    server::serve(state, telegram_config.port).await?;

    sweeper.abort();
    Ok(())
}
