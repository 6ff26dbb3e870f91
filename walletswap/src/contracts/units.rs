//! Exact conversion between decimal strings and token base units.

use alloy_primitives::U256;
use thiserror::Error;

/// Why a user-entered amount could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("'{input}' has more than {decimals} fractional digits")]
    TooManyDecimals { input: String, decimals: u8 },

    #[error("'{0}' does not fit in 256 bits")]
    Overflow(String),
}

/// Parse a plain decimal string (`"100"`, `"0.25"`, `".5"`) into base units.
///
/// Signs, exponents, separators and surrounding garbage are rejected. Fractional
/// digits beyond `decimals` are an error, never truncated.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(AmountError::NotANumber(trimmed.to_string()));
    }

    if frac_part.len() > usize::from(decimals) {
        return Err(AmountError::TooManyDecimals {
            input: trimmed.to_string(),
            decimals,
        });
    }

    let padding = usize::from(decimals) - frac_part.len();
    let overflow = || AmountError::Overflow(trimmed.to_string());

    let mut value = U256::ZERO;
    let ten = U256::from(10u8);
    for digit in int_part.bytes().chain(frac_part.bytes()) {
        value = value
            .checked_mul(ten)
            .and_then(|v| v.checked_add(U256::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    for _ in 0..padding {
        value = value.checked_mul(ten).ok_or_else(overflow)?;
    }

    if value.is_zero() {
        return Err(AmountError::NotPositive);
    }

    Ok(value)
}

/// Render base units as a decimal string, trimming trailing fractional zeros.
pub fn format_amount(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}
