//! Error types for the leverage wizard

use crate::session::{SessionField, WizardState};
use leverage_utils::EnvVarError;
use thiserror::Error;

/// Leverage calculation and session errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LeverageError {
    /// User-supplied value failed parsing or the positivity/bounds check
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: SessionField, reason: String },

    /// Entry equals stop, so no finite leverage liquidates the position
    #[error("leverage undefined when entry equals stop loss")]
    DivisionByZero,

    /// A field was written out of order
    #[error("Cannot set {attempted} while session is {state}")]
    StateMismatch {
        state: WizardState,
        attempted: SessionField,
    },

    /// The session store mutex was poisoned
    #[error("Session lock error: {0}")]
    SessionLock(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LeverageError {
    /// Shorthand for an [`LeverageError::InvalidInput`]
    pub fn invalid(field: SessionField, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<EnvVarError> for LeverageError {
    fn from(err: EnvVarError) -> Self {
        LeverageError::ConfigError(err.to_string())
    }
}

/// Result type alias for leverage operations
pub type Result<T> = std::result::Result<T, LeverageError>;
