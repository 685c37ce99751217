//! Fixed-point arithmetic for pool accounting.
//!
//! Token amounts are raw integer units scaled by each asset's decimals.
//! Exchange rates between the yield-bearing token and the base asset are
//! WAD-scaled (`1e18` == parity). No floating point is used anywhere.

use crate::error::PoolError;
use serde::{Deserialize, Serialize};

/// Raw token amount in the asset's smallest unit.
pub type Amount = u128;

/// Fixed-point scale used by [`Rate`].
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Computes `a * b / denominator`, rounding down.
///
/// # Errors
///
/// Returns [`PoolError::Overflow`] if the product does not fit in `u128` or
/// the denominator is zero.
pub fn mul_div_floor(
    a: u128,
    b: u128,
    denominator: u128,
    operation: &'static str,
) -> Result<u128, PoolError> {
    if denominator == 0 {
        return Err(PoolError::Overflow { operation });
    }
    a.checked_mul(b)
        .map(|product| product / denominator)
        .ok_or(PoolError::Overflow { operation })
}

/// Computes `a * b / denominator`, rounding up.
///
/// # Errors
///
/// Returns [`PoolError::Overflow`] if the product does not fit in `u128` or
/// the denominator is zero.
pub fn mul_div_ceil(
    a: u128,
    b: u128,
    denominator: u128,
    operation: &'static str,
) -> Result<u128, PoolError> {
    if denominator == 0 {
        return Err(PoolError::Overflow { operation });
    }
    let product = a.checked_mul(b).ok_or(PoolError::Overflow { operation })?;
    let quotient = product / denominator;
    if product % denominator == 0 {
        Ok(quotient)
    } else {
        quotient
            .checked_add(1)
            .ok_or(PoolError::Overflow { operation })
    }
}

/// Checked addition that reports which accounting step overflowed.
///
/// # Errors
///
/// Returns [`PoolError::Overflow`] when the sum exceeds `u128::MAX`.
pub fn checked_add(a: Amount, b: Amount, operation: &'static str) -> Result<Amount, PoolError> {
    a.checked_add(b).ok_or(PoolError::Overflow { operation })
}

/// Base-asset value of one whole yield-bearing token, WAD scaled.
///
/// A rate of [`Rate::ONE`] means one YBT unit is worth one base unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(u128);

impl Rate {
    /// Parity between YBT and base units.
    pub const ONE: Self = Self(WAD);

    /// Wraps a raw WAD-scaled value.
    #[must_use]
    pub const fn from_wad(raw: u128) -> Self {
        Self(raw)
    }

    /// Builds a rate from a `numerator / denominator` ratio.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] on a zero denominator or overflow.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self, PoolError> {
        mul_div_floor(numerator, WAD, denominator, "rate from ratio").map(Self)
    }

    /// Raw WAD-scaled value.
    #[must_use]
    pub const fn wad(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// YBT units needed to cover `base` at this rate, rounded up so the
    /// collateral never falls short of the base value.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] on overflow or a zero rate.
    pub fn base_to_ybt_ceil(self, base: Amount) -> Result<Amount, PoolError> {
        mul_div_ceil(base, WAD, self.0, "base to ybt")
    }

    /// Base value of `ybt` units at this rate, rounded down.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Overflow`] on overflow.
    pub fn ybt_to_base_floor(self, ybt: Amount) -> Result<Amount, PoolError> {
        mul_div_floor(ybt, self.0, WAD, "ybt to base")
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / WAD;
        let frac = self.0 % WAD;
        write!(f, "{whole}.{frac:018}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_floor_rounds_down() {
        assert_eq!(mul_div_floor(10, 3, 4, "t").unwrap(), 7);
    }

    #[test]
    fn mul_div_ceil_rounds_up_only_with_remainder() {
        assert_eq!(mul_div_ceil(10, 3, 4, "t").unwrap(), 8);
        assert_eq!(mul_div_ceil(8, 3, 4, "t").unwrap(), 6);
    }

    #[test]
    fn zero_denominator_is_overflow() {
        assert_eq!(
            mul_div_floor(1, 1, 0, "zero").unwrap_err(),
            PoolError::Overflow { operation: "zero" }
        );
    }

    #[test]
    fn product_overflow_is_reported() {
        assert!(mul_div_ceil(u128::MAX, 2, 1, "big").is_err());
    }

    #[test]
    fn parity_rate_converts_one_to_one() {
        assert_eq!(Rate::ONE.base_to_ybt_ceil(1_000).unwrap(), 1_000);
        assert_eq!(Rate::ONE.ybt_to_base_floor(1_000).unwrap(), 1_000);
    }

    #[test]
    fn appreciated_rate_needs_less_collateral() {
        // 1 YBT = 1.25 base
        let rate = Rate::from_ratio(5, 4).unwrap();
        assert_eq!(rate.base_to_ybt_ceil(1_000).unwrap(), 800);
        // 999 / 1.25 = 799.2, rounded up
        assert_eq!(rate.base_to_ybt_ceil(999).unwrap(), 800);
        assert_eq!(rate.ybt_to_base_floor(800).unwrap(), 1_000);
    }

    #[test]
    fn rate_display_is_fixed_point() {
        assert_eq!(Rate::ONE.to_string(), "1.000000000000000000");
        assert_eq!(
            Rate::from_ratio(3, 2).unwrap().to_string(),
            "1.500000000000000000"
        );
    }
}
