//! Leverage calculator core
//!
//! This crate holds everything the leverage bot does apart from talking to a
//! chat platform:
//!
//! - [`calculator`]: the pure leverage formula and input parsing
//! - [`session`]: per-user wizard sessions with an idle timeout
//! - [`bot`]: the conversation state machine that turns one inbound message
//!   into exactly one reply
//!
//! A transport only needs [`LeverageBot::process_input`]: given the sender id
//! and message text, it returns the reply to deliver.

pub mod bot;
pub mod calculator;
pub mod config;
pub mod error;
pub mod session;

pub use bot::{BotReply, Command, LeverageBot, ResponseType};
pub use calculator::{Direction, InputBounds, LeverageCalculation, compute_leverage, parse_amount};
pub use config::WizardConfig;
pub use error::{LeverageError, Result};
pub use session::{Session, SessionField, SessionStore, WizardState};
