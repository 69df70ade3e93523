//! Leverage calculation
//!
//! Answers one question: at what leverage does a move from the entry price to
//! the stop price wipe out 100% of the margin? For a move of `d` percent the
//! answer is `100 / d`, i.e. `entry / |entry - stop|`. The formula does not
//! depend on trade direction, and the margin only scales the resulting
//! position size.

use crate::error::{LeverageError, Result};
use crate::session::SessionField;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Largest price or margin accepted by default
pub const DEFAULT_MAX_INPUT: f64 = 1_000_000.0;

/// Digits grouped in threes by `,`, with an optional fractional part
const THOUSANDS_PATTERN: &str = r"^\d{1,3}(,\d{3})+(\.\d+)?$";

/// Decimal places used when presenting results
pub const DISPLAY_PRECISION: i32 = 2;

/// Accepted range for user-supplied amounts: `0 < value <= max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputBounds {
    pub max: f64,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX_INPUT,
        }
    }
}

/// Side of the position implied by where the stop sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Stop below entry
    Long,
    /// Stop above entry
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

/// Outcome of a successful leverage calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageCalculation {
    pub entry_price: f64,
    pub stop_price: f64,
    pub margin: f64,
    /// Unrounded leverage
    pub leverage: f64,
    /// `|entry - stop| / entry * 100`
    pub distance_percent: f64,
    pub direction: Direction,
}

impl LeverageCalculation {
    /// Leverage rounded for display
    pub fn leverage_rounded(&self) -> f64 {
        round_to(self.leverage, DISPLAY_PRECISION)
    }

    /// Distance to stop rounded for display
    pub fn distance_percent_rounded(&self) -> f64 {
        round_to(self.distance_percent, DISPLAY_PRECISION)
    }

    /// Notional position size implied by the margin at this leverage
    pub fn position_size(&self) -> f64 {
        self.margin * self.leverage
    }
}

/// Compute the leverage at which the position is liquidated exactly at the stop
pub fn compute_leverage(entry: f64, stop: f64, margin: f64) -> Result<LeverageCalculation> {
    ensure_positive(SessionField::EntryPrice, entry)?;
    ensure_positive(SessionField::StopPrice, stop)?;
    ensure_positive(SessionField::Margin, margin)?;

    let delta = (entry - stop).abs();
    if delta == 0.0 {
        return Err(LeverageError::DivisionByZero);
    }

    let direction = if stop < entry {
        Direction::Long
    } else {
        Direction::Short
    };

    Ok(LeverageCalculation {
        entry_price: entry,
        stop_price: stop,
        margin,
        leverage: entry / delta,
        distance_percent: delta / entry * 100.0,
        direction,
    })
}

/// Parse user text into an amount for `field`
///
/// Accepts surrounding whitespace, `,` thousands separators in proper groups
/// of three and a trailing `USDT` or `$` unit. A decimal comma such as `1,5`
/// is rejected. The value must be finite and within `bounds`.
pub fn parse_amount(text: &str, field: SessionField, bounds: InputBounds) -> Result<f64> {
    let cleaned = strip_thousands_separators(strip_unit(text.trim()), field)?;
    if cleaned.is_empty() {
        return Err(LeverageError::invalid(field, "no number given"));
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| LeverageError::invalid(field, format!("{:?} is not a number", text.trim())))?;

    ensure_positive(field, value)?;
    if value > bounds.max {
        return Err(LeverageError::invalid(
            field,
            format!("must not exceed {}", bounds.max),
        ));
    }

    Ok(value)
}

fn strip_unit(text: &str) -> &str {
    let text = text.trim_start_matches('$');
    let lower = text.to_ascii_lowercase();
    let text = if lower.ends_with("usdt") {
        &text[..text.len() - 4]
    } else {
        text
    };
    text.trim_end_matches('$').trim()
}

fn strip_thousands_separators(text: &str, field: SessionField) -> Result<String> {
    if !text.contains(',') {
        return Ok(text.to_string());
    }

    let grouped =
        Regex::new(THOUSANDS_PATTERN).map_err(|e| LeverageError::invalid(field, e.to_string()))?;
    if !grouped.is_match(text) {
        return Err(LeverageError::invalid(
            field,
            format!("{text:?} is not a number"),
        ));
    }

    Ok(text.replace(',', ""))
}

fn ensure_positive(field: SessionField, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(LeverageError::invalid(field, "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(LeverageError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

/// Round half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
