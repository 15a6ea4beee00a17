//! Conversion between human-entered decimal amounts and on-chain base units.
//!
//! A deposit amount arrives as a decimal in human units (e.g. `100.5` tokens)
//! and must be embedded into the signed message as an integer scaled by the
//! token's decimal precision. The conversion rounds (midpoint away from zero)
//! to the token's precision before widening -- it never truncates -- and must
//! match the verifying contract's fixed-point assumptions exactly, or the
//! signature authorizes a different amount than the caller intended.

use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::EncodingError;

/// The largest fractional-digit count a [`Decimal`] can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Converts a human-unit decimal amount into base units for `decimals`.
///
/// The amount is first rounded to the token's precision (half-up, away from
/// zero), then scaled to an integer. Deterministic for a given
/// `(amount, decimals)` pair.
///
/// # Errors
///
/// Returns [`EncodingError::NegativeAmount`] for negative inputs and
/// [`EncodingError::AmountOverflow`] when the scaled value does not fit
/// the 256-bit integer domain.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, EncodingError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(EncodingError::NegativeAmount(amount));
    }

    let precision = u32::from(decimals).min(MAX_DECIMAL_SCALE);
    let rounded = amount.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);

    // The rounded value has scale <= decimals; the remainder of the scaling
    // happens in the integer domain.
    let mantissa = u128::try_from(rounded.mantissa())
        .map_err(|_| EncodingError::NegativeAmount(amount))?;
    let residual_exp = u32::from(decimals) - rounded.scale();

    let factor = U256::from(10)
        .checked_pow(U256::from(residual_exp))
        .ok_or(EncodingError::AmountOverflow { decimals })?;
    U256::from(mantissa)
        .checked_mul(factor)
        .ok_or(EncodingError::AmountOverflow { decimals })
}

/// Converts a base-unit integer back into a human-unit decimal.
///
/// Inverse of [`to_base_units`] up to one unit of rounding.
///
/// # Errors
///
/// Returns [`EncodingError::PrecisionLoss`] when the value or the decimal
/// count exceeds what a 96-bit decimal mantissa can represent.
pub fn to_decimal(units: U256, decimals: u8) -> Result<Decimal, EncodingError> {
    if u32::from(decimals) > MAX_DECIMAL_SCALE {
        return Err(EncodingError::PrecisionLoss { decimals });
    }
    let mantissa = i128::try_from(units).map_err(|_| EncodingError::PrecisionLoss { decimals })?;
    Decimal::try_from_i128_with_scale(mantissa, u32::from(decimals))
        .map_err(|_| EncodingError::PrecisionLoss { decimals })
}
