//! Leverage Calculator Bot
//!
//! The conversational wizard: prompts for entry price, stop loss and margin
//! in that order, validates each answer, and replies with the leverage at
//! which the stop loss wipes out the margin.
//!
//! Every inbound message produces exactly one [`BotReply`]. All session reads
//! and writes for one message happen under a single lock of the
//! [`SessionStore`], so two quick messages from the same user are applied in
//! order.
//!
//! # Example
//!
//! ```rust
//! use leverage_core::bot::LeverageBot;
//! use leverage_core::WizardConfig;
//!
//! let bot = LeverageBot::new(WizardConfig::default());
//! bot.process_input("42", "/start");
//! bot.process_input("42", "100");
//! bot.process_input("42", "90");
//! let reply = bot.process_input("42", "50");
//! assert!(reply.content.contains("10.00x"));
//! ```

pub mod commands;
pub mod messages;
pub mod reply;

use crate::calculator::{compute_leverage, parse_amount};
use crate::config::WizardConfig;
use crate::error::{LeverageError, Result};
use crate::session::{Lookup, Session, SessionField, SessionStore, SessionTable, WizardState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

pub use commands::Command;
pub use reply::{BotReply, ResponseType};

/// Leverage Calculator Bot
pub struct LeverageBot {
    /// Per-user wizard sessions
    store: Arc<SessionStore>,
    /// Bot configuration
    config: WizardConfig,
}

impl LeverageBot {
    /// Create a bot with its own session store
    pub fn new(config: WizardConfig) -> Self {
        let store = Arc::new(SessionStore::new(config.idle_timeout));
        Self { store, config }
    }

    /// Create a bot over an existing store
    pub fn with_store(store: Arc<SessionStore>, config: WizardConfig) -> Self {
        Self { store, config }
    }

    /// Get the session store
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Process user input and return the reply
    pub fn process_input(&self, user_id: &str, input: &str) -> BotReply {
        self.process_input_at(user_id, input, Utc::now())
    }

    /// Process user input as if it arrived at `now`
    pub fn process_input_at(&self, user_id: &str, input: &str, now: DateTime<Utc>) -> BotReply {
        match self.try_process(user_id, input, now) {
            Ok(reply) => reply,
            Err(err) => {
                error!(user_id, error = %err, "Failed to process message, resetting session");
                if let Ok(mut table) = self.store.lock() {
                    table.delete(user_id);
                }
                BotReply::error(messages::apology())
            }
        }
    }

    fn try_process(&self, user_id: &str, input: &str, now: DateTime<Utc>) -> Result<BotReply> {
        let mut table = self.store.lock()?;

        match Command::parse(input) {
            Command::Start => {
                table.restart(user_id, now);
                info!(user_id, "Calculation started");
                Ok(BotReply::formatted(messages::welcome()))
            }
            Command::Help => Ok(BotReply::formatted(messages::help(self.config.input_bounds))),
            Command::Cancel => {
                if table.delete_live(user_id, now) {
                    info!(user_id, "Calculation cancelled");
                    Ok(BotReply::text(messages::cancelled()))
                } else {
                    Ok(BotReply::text(messages::nothing_to_cancel()))
                }
            }
            Command::Unknown { name } => Ok(BotReply::text(messages::unknown_command(&name))),
            Command::Value { text } => self.handle_value(&mut table, user_id, &text, now),
        }
    }

    fn handle_value(
        &self,
        table: &mut SessionTable<'_>,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<BotReply> {
        let session = match table.get_or_create(user_id, now) {
            Lookup::Existing(session) => session,
            Lookup::Created(_) => return Ok(BotReply::formatted(messages::welcome())),
            Lookup::Expired(_) => return Ok(BotReply::text(messages::session_expired())),
        };

        let field = session
            .state
            .expected_field()
            .ok_or(LeverageError::StateMismatch {
                state: session.state,
                attempted: SessionField::EntryPrice,
            })?;

        let value = match parse_amount(text, field, self.config.input_bounds) {
            Ok(value) => value,
            Err(LeverageError::InvalidInput { reason, .. }) => {
                debug!(user_id, %field, reason = %reason, "Rejected input");
                return Ok(BotReply::error(messages::invalid_input(
                    field,
                    self.config.input_bounds,
                )));
            }
            Err(err) => return Err(err),
        };

        let session = table.update(user_id, field, value, now)?;
        debug!(user_id, %field, value, state = %session.state, "Accepted input");

        match session.state.expected_field() {
            Some(next) => Ok(BotReply::text(messages::prompt(next))),
            None => {
                table.delete(user_id);
                self.complete(&session)
            }
        }
    }

    fn complete(&self, session: &Session) -> Result<BotReply> {
        let (entry, stop, margin) = session.inputs().ok_or(LeverageError::StateMismatch {
            state: session.state,
            attempted: SessionField::Margin,
        })?;

        match compute_leverage(entry, stop, margin) {
            Ok(calc) if calc.leverage > self.config.max_leverage => {
                info!(
                    user_id = %session.user_id,
                    leverage = calc.leverage,
                    "Leverage above sanity bound"
                );
                Ok(BotReply::error(messages::leverage_too_high(
                    &calc,
                    self.config.max_leverage,
                )))
            }
            Ok(calc) => {
                info!(
                    user_id = %session.user_id,
                    leverage = calc.leverage,
                    direction = %calc.direction,
                    "Calculation complete"
                );
                Ok(BotReply::formatted(messages::result(&calc)))
            }
            Err(LeverageError::DivisionByZero) => {
                Ok(BotReply::error(messages::division_by_zero()))
            }
            Err(err) => Err(err),
        }
    }

    /// Current wizard state for a user, if a session is live
    pub fn state_of(&self, user_id: &str) -> Option<WizardState> {
        let table = self.store.lock().ok()?;
        table
            .get(user_id)
            .filter(|s| !s.is_expired(Utc::now(), self.store.idle_timeout()))
            .map(|s| s.state)
    }
}
