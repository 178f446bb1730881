//! # Token Unit Conversion
//!
//! On-chain amounts are integers in base units (wei-style, scaled by
//! `10^decimals`). Humans type and read decimals. This module converts
//! between the two exactly, with `U256` on the integer side and a decimal
//! string on the human side.
//!
//! Floating point only appears at the very edge, in [`to_decimal`], for
//! display and for the activity ledger (which stores amounts as JSON
//! numbers). Nothing that is sent to a contract ever passes through `f64`.

use ethereum_types::U256;
use thiserror::Error;

/// Errors from parsing a human-entered amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0:?}")]
    Invalid(String),

    #[error("amount {amount:?} has more than {decimals} fractional digits")]
    TooManyDecimals { amount: String, decimals: u32 },

    #[error("amount {0:?} does not fit in 256 bits")]
    Overflow(String),
}

/// Parses a decimal string like `"1500.25"` into base units.
///
/// Accepts an optional fractional part (`"1."` and `".5"` are fine) but no
/// sign, exponent or thousands separators. Excess precision is an error
/// rather than silently rounded.
pub fn parse_units(text: &str, decimals: u32) -> Result<U256, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
        return Err(UnitsError::Invalid(text.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            amount: text.to_string(),
            decimals,
        });
    }

    let scaled = format!("{whole}{frac:0<width$}", width = decimals as usize);
    let digits = scaled.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| UnitsError::Overflow(text.to_string()))
}

/// Renders base units as an exact decimal string, trailing zeros trimmed.
pub fn format_units(value: U256, decimals: u32) -> String {
    let base = U256::exp10(decimals as usize);
    let whole = value / base;
    let frac = value % base;
    if frac.is_zero() {
        return whole.to_string();
    }

    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Base units as a float, for display and ledger bookkeeping.
pub fn to_decimal(value: U256, decimals: u32) -> f64 {
    format_units(value, decimals).parse().unwrap_or(0.0)
}
