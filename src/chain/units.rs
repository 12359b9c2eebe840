//! Conversions between whole-unit decimals and atomic token amounts.

use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::error::TradeError;

/// Convert a whole-unit amount into atomic units.
///
/// Rejects non-positive amounts and amounts with more fractional digits than
/// the token supports.
pub fn to_atomic(amount: Decimal, decimals: u8) -> Result<U256, TradeError> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO {
        return Err(TradeError::NonPositiveAmount);
    }
    let scale = amount.scale();
    if scale > u32::from(decimals) {
        return Err(TradeError::InvalidAmount {
            amount: amount.to_string(),
            reason: format!("token supports at most {decimals} decimal places"),
        });
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let factor = U256::from(10u64).pow(U256::from(u32::from(decimals) - scale));
    Ok(mantissa * factor)
}

/// Format an atomic amount as a whole-unit decimal string without trailing zeros.
pub fn from_atomic(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{digits}", "0".repeat(decimals - digits.len() + 1))
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Convert an atomic amount to a `Decimal` for arithmetic.
///
/// Fails when the value exceeds what `Decimal` can represent.
pub fn to_decimal(value: U256, decimals: u8) -> Result<Decimal, TradeError> {
    let text = from_atomic(value, decimals);
    Decimal::from_str(&text).map_err(|e| TradeError::InvalidAmount {
        amount: text,
        reason: e.to_string(),
    })
}

/// Apply a slippage tolerance (in percent) to an expected output.
///
/// The tolerance is rounded to whole basis points.
pub fn min_amount_out(quote: U256, slippage_percent: Decimal) -> U256 {
    let bps = (slippage_percent * Decimal::from(100))
        .round()
        .clamp(Decimal::ZERO, Decimal::from(10_000));
    let bps = u64::try_from(bps).unwrap_or(0);
    quote * U256::from(10_000 - bps) / U256::from(10_000)
}
