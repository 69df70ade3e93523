//! User-facing message text

use crate::calculator::{Direction, InputBounds, LeverageCalculation};
use crate::session::SessionField;

pub fn welcome() -> String {
    format!(
        "🚀 *Welcome to the Leverage Calculator!*\n\n\
         I'll help you calculate the leverage at which you lose 100% of your margin \
         if the price hits your stop loss.\n\n{}",
        prompt(SessionField::EntryPrice)
    )
}

pub fn session_expired() -> String {
    format!(
        "⌛ Your previous calculation timed out, so let's start again.\n\n{}",
        prompt(SessionField::EntryPrice)
    )
}

pub fn help(bounds: InputBounds) -> String {
    format!(
        "📚 *How to use this bot:*\n\n\
         1. Use /start to begin a new calculation\n\
         2. Enter your entry price in USDT\n\
         3. Enter your stop loss price in USDT\n\
         4. Enter your margin amount in USDT\n\n\
         Values must be greater than 0 and at most {} USDT.\n\n\
         The bot will calculate:\n\
         • Percentage distance to stop loss\n\
         • Leverage at which the stop loss wipes out 100% of the margin\n\n\
         Use /cancel to abandon a calculation.",
        format_amount(bounds.max)
    )
}

pub fn prompt(field: SessionField) -> String {
    match field {
        SessionField::EntryPrice => "📥 Please enter your Entry Price (USDT):".to_string(),
        SessionField::StopPrice => "📉 Please enter your Stop Loss (USDT):".to_string(),
        SessionField::Margin => "💵 Please enter your margin amount in USDT:".to_string(),
    }
}

pub fn invalid_input(field: SessionField, bounds: InputBounds) -> String {
    format!(
        "⛔ Please enter a valid {field}: a number greater than 0 and at most {} USDT.\n\n{}",
        format_amount(bounds.max),
        prompt(field)
    )
}

pub fn cancelled() -> String {
    "🛑 Calculation cancelled. Use /start to begin a new one.".to_string()
}

pub fn nothing_to_cancel() -> String {
    "Nothing to cancel. Use /start to begin a calculation.".to_string()
}

pub fn unknown_command(name: &str) -> String {
    format!("Unknown command /{name}. Use /start to begin or /help for instructions.")
}

pub fn division_by_zero() -> String {
    "❌ Leverage is undefined when entry equals stop loss. Use /start to try again.".to_string()
}

pub fn leverage_too_high(calc: &LeverageCalculation, max_leverage: f64) -> String {
    format!(
        "⚠️ Your stop loss is only {}% away from entry, which would need {}x leverage. \
         That is above the {}x limit this bot will quote.\n\n\
         💡 Use /start for a new calculation",
        calc.distance_percent_rounded(),
        format_amount(calc.leverage_rounded()),
        format_amount(max_leverage)
    )
}

pub fn apology() -> String {
    "❌ Sorry, something went wrong. Please use /start to begin again.".to_string()
}

pub fn result(calc: &LeverageCalculation) -> String {
    let side = match calc.direction {
        Direction::Long => "Long (stop below entry)",
        Direction::Short => "Short (stop above entry)",
    };
    let leverage = calc.leverage_rounded();

    format!(
        "📊 *Calculation Results:*\n\n\
         📥 Entry Price: {entry} USDT\n\
         📉 Stop Loss: {stop} USDT\n\
         💰 Margin: {margin} USDT\n\
         🧭 Side: {side}\n\n\
         🔻 Distance to SL: {distance}%\n\
         📈 Required Leverage: {leverage}x\n\
         📦 Position Size: {size} USDT\n\n\
         ⚠️ *Risk Warning:* Using {leverage}x leverage means your margin \
         will be completely lost if the price reaches {stop} USDT.\n\n\
         💡 Use /start for a new calculation",
        entry = format_amount(calc.entry_price),
        stop = format_amount(calc.stop_price),
        margin = format_amount(calc.margin),
        distance = format!("{:.2}", calc.distance_percent_rounded()),
        leverage = format!("{leverage:.2}"),
        size = format_amount(calc.position_size()),
    )
}

/// Two decimals with `,` thousands separators, e.g. `64,250.00`
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
