//! Configuration for the leverage wizard

use crate::calculator::InputBounds;
use crate::error::{LeverageError, Result};
use leverage_utils::{EnvLookup, parse_var};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default idle period after which a session is discarded
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Largest leverage the bot will quote before telling the user the stop is too tight
pub const DEFAULT_MAX_LEVERAGE: f64 = 1000.0;

/// Configuration for the conversation wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Sessions idle for longer than this are purged
    pub idle_timeout: Duration,

    /// Accepted range for prices and margin
    pub input_bounds: InputBounds,

    /// Results above this leverage are rejected as unrealistic
    pub max_leverage: f64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            input_bounds: InputBounds::default(),
            max_leverage: DEFAULT_MAX_LEVERAGE,
        }
    }
}

impl WizardConfig {
    /// Create a new configuration builder
    pub fn builder() -> WizardConfigBuilder {
        WizardConfigBuilder::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Recognised keys: `SESSION_IDLE_TIMEOUT_SECS`, `MAX_INPUT_VALUE`, `MAX_LEVERAGE`.
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(secs) = parse_var::<u64>(lookup, "SESSION_IDLE_TIMEOUT_SECS")? {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var::<f64>(lookup, "MAX_INPUT_VALUE")? {
            builder = builder.max_input(max);
        }
        if let Some(max) = parse_var::<f64>(lookup, "MAX_LEVERAGE")? {
            builder = builder.max_leverage(max);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(LeverageError::ConfigError(
                "idle_timeout must be greater than 0".to_string(),
            ));
        }

        if !(self.input_bounds.max.is_finite() && self.input_bounds.max > 0.0) {
            return Err(LeverageError::ConfigError(
                "max input value must be a positive number".to_string(),
            ));
        }

        if !(self.max_leverage.is_finite() && self.max_leverage >= 1.0) {
            return Err(LeverageError::ConfigError(
                "max_leverage must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for WizardConfig
#[derive(Debug, Default)]
pub struct WizardConfigBuilder {
    idle_timeout: Option<Duration>,
    max_input: Option<f64>,
    max_leverage: Option<f64>,
}

impl WizardConfigBuilder {
    /// Set the session idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the largest accepted price or margin
    pub fn max_input(mut self, max: f64) -> Self {
        self.max_input = Some(max);
        self
    }

    /// Set the leverage sanity bound
    pub fn max_leverage(mut self, max: f64) -> Self {
        self.max_leverage = Some(max);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<WizardConfig> {
        let defaults = WizardConfig::default();

        let config = WizardConfig {
            idle_timeout: self.idle_timeout.unwrap_or(defaults.idle_timeout),
            input_bounds: self
                .max_input
                .map_or(defaults.input_bounds, |max| InputBounds { max }),
            max_leverage: self.max_leverage.unwrap_or(defaults.max_leverage),
        };

        config.validate()?;
        Ok(config)
    }
}
