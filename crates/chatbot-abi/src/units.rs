//! Conversion between human-readable decimal strings and fixed-point integers.

use alloc::{format, string::String};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitsError {
    Empty,
    InvalidDigit,
    TooManyDecimals { max: u32 },
    Overflow,
}

impl core::fmt::Display for UnitsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UnitsError::Empty => f.write_str("empty amount"),
            UnitsError::InvalidDigit => f.write_str("amount must be a non-negative decimal number"),
            UnitsError::TooManyDecimals { max } => {
                write!(f, "amount has more than {} fractional digits", max)
            }
            UnitsError::Overflow => f.write_str("amount is too large"),
        }
    }
}

/// Parse `"1.5"` into `1.5 * 10^decimals`.
///
/// Trailing fractional zeros beyond `decimals` are accepted; any other excess
/// precision is an error rather than a silent rounding.
pub fn parse_units(value: &str, decimals: u32) -> Result<u128, UnitsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitsError::Empty);
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(UnitsError::InvalidDigit);
    }

    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals { max: decimals });
    }

    let scale = 10u128.checked_pow(decimals).ok_or(UnitsError::Overflow)?;
    let frac_scale = 10u128
        .checked_pow(decimals - frac_part.len() as u32)
        .ok_or(UnitsError::Overflow)?;

    let whole = parse_digits(int_part)?
        .checked_mul(scale)
        .ok_or(UnitsError::Overflow)?;
    let fraction = parse_digits(frac_part)?
        .checked_mul(frac_scale)
        .ok_or(UnitsError::Overflow)?;

    whole.checked_add(fraction).ok_or(UnitsError::Overflow)
}

/// Format `value / 10^decimals` with at least one fractional digit
/// (`10^18 → "1.0"`, `0 → "0.0"`).
pub fn format_units(value: u128, decimals: u32) -> String {
    let digits = format!("{}", value);
    let decimals = decimals as usize;

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let split = padded.len() - decimals;
    let (whole, fraction) = padded.split_at(split);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, fraction)
    }
}

fn parse_digits(digits: &str) -> Result<u128, UnitsError> {
    digits.bytes().try_fold(0u128, |acc, b| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as u128))
            .ok_or(UnitsError::Overflow)
    })
}
