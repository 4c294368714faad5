// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal string ↔ base unit conversion.
//!
//! Amounts travel as decimal strings ("10", "12.5") and are only ever turned
//! into integers of the asset's smallest unit. No floating point is involved.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount `{0}` is not a valid positive decimal")]
    Malformed(String),

    #[error("amount `{amount}` has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u8 },

    #[error("amount `{0}` is too large")]
    Overflow(String),
}

/// Parse a human-readable amount into base units.
///
/// `"10"` with 6 decimals is `10_000_000`. Extra precision beyond `decimals`
/// is an error rather than a rounding.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<u64, AmountError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole_part, fraction_part) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole_part.is_empty() || !all_digits(whole_part) || !all_digits(fraction_part) {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }

    if fraction_part.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            amount: trimmed.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(trimmed.to_string());

    let whole = whole_part.parse::<u128>().map_err(|_| overflow())?;
    // Pad with zeros to match decimals
    let padded = format!("{:0<width$}", fraction_part, width = decimals as usize);
    let fraction = if padded.is_empty() {
        0
    } else {
        padded.parse::<u128>().map_err(|_| overflow())?
    };

    let total = 10u128
        .checked_pow(decimals as u32)
        .and_then(|multiplier| whole.checked_mul(multiplier))
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(overflow)?;

    u64::try_from(total).map_err(|_| overflow())
}

/// Format base units as a human-readable decimal string.
pub fn format_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let divisor = 10u128.pow(decimals as u32);
    let whole = amount as u128 / divisor;
    let remainder = amount as u128 % divisor;

    if remainder == 0 {
        return whole.to_string();
    }

    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
}

/// Compare two decimal strings numerically at the given precision.
pub fn compare_amounts(
    left: &str,
    right: &str,
    decimals: u8,
) -> Result<std::cmp::Ordering, AmountError> {
    Ok(parse_amount(left, decimals)?.cmp(&parse_amount(right, decimals)?))
}
