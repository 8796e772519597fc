//! Conversion between decimal amounts and stored minor units.
//!
//! Amounts cross the API as [`Decimal`] and are persisted as `i64` cents, so
//! no binary floating point ever touches a balance.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Number of fractional digits carried by one minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Converts a strictly positive amount into minor units.
///
/// Rejects zero, negative amounts, amounts with more than
/// [`MINOR_UNIT_SCALE`] fractional digits and amounts that overflow `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    to_non_negative_minor_units(amount)
}

/// Like [`to_minor_units`] but accepts zero, used for opening balances.
pub fn to_non_negative_minor_units(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }

    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(Error::InvalidAmount { amount });
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.to_i64())
        .ok_or(Error::InvalidAmount { amount })
}

/// Converts stored minor units back into a decimal amount.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}
