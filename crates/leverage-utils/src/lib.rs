//! Shared utilities for leverage-bot
//!
//! This crate provides common functionality used across the workspace:
//! logging setup and typed access to environment configuration.

pub mod config;
pub mod logging;

pub use config::{EnvLookup, EnvVarError, optional_var, parse_var, required_var};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
