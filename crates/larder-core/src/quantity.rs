//! # Quantity Module
//!
//! Provides the `Quantity` type for physical stock amounts.
//!
//! ## Why Integer Quantities?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE LEDGER MUST BALANCE EXACTLY                                        │
//! │                                                                         │
//! │  Invariant: quantity == initial + Σ(signed movements)                   │
//! │                                                                         │
//! │  With f64 quantities:                                                   │
//! │    0.1 + 0.2 ≠ 0.3  → the invariant drifts after enough movements      │
//! │                                                                         │
//! │  OUR SOLUTION: milli-units (same rule as Money's integer cents)        │
//! │    1 kg    = 1000                                                       │
//! │    1 l     = 1000                                                       │
//! │    1 piece = 1000                                                       │
//! │                                                                         │
//! │  Every depletion, receipt, and adjustment is an exact i64 sum.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scale is always milli-units of the **product's own unit**; recipe
//! quantities are expressed in the referenced product's unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::money::Money;

/// Milli-units per whole unit (1 kg = 1000).
pub const MILLI_PER_UNIT: i64 = 1000;

// =============================================================================
// Quantity Type
// =============================================================================

/// A physical quantity in milli-units of a product's unit.
///
/// Signed: ledger movements use negative values for depletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from milli-units.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::quantity::Quantity;
    ///
    /// let q = Quantity::from_milli(2500); // 2.5 kg
    /// assert_eq!(q.milli(), 2500);
    /// ```
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units (2 ⇒ 2 kg).
    #[inline]
    pub const fn from_whole(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Returns the value in milli-units.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    /// Returns zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Quantity(self.0.abs())
    }

    /// Scales the quantity by an integer multiplier (portions sold).
    #[inline]
    pub const fn scale(&self, multiplier: i64) -> Self {
        Quantity(self.0 * multiplier)
    }

    /// Cost of this quantity at a per-whole-unit price, rounded half up.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::money::Money;
    /// use larder_core::quantity::Quantity;
    ///
    /// // 1.5 kg at €3.00/kg = €4.50
    /// let q = Quantity::from_milli(1500);
    /// assert_eq!(q.cost_at(Money::from_cents(300)).cents(), 450);
    /// ```
    pub fn cost_at(&self, unit_price: Money) -> Money {
        // i128 to avoid overflow on large quantities × prices
        let cents =
            (self.0 as i128 * unit_price.cents() as i128 + MILLI_PER_UNIT as i128 / 2)
                / MILLI_PER_UNIT as i128;
        Money::from_cents(cents as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display trims trailing zeros: 6000 → "6", 1500 → "1.5", 250 → "0.25".
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / MILLI_PER_UNIT;
        let frac = abs % MILLI_PER_UNIT;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac_str = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, frac_str.trim_end_matches('0'))
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_whole_and_milli() {
        assert_eq!(Quantity::from_whole(2).milli(), 2000);
        assert_eq!(Quantity::from_milli(2500).milli(), 2500);
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(format!("{}", Quantity::from_milli(6000)), "6");
        assert_eq!(format!("{}", Quantity::from_milli(1500)), "1.5");
        assert_eq!(format!("{}", Quantity::from_milli(250)), "0.25");
        assert_eq!(format!("{}", Quantity::from_milli(5)), "0.005");
        assert_eq!(format!("{}", Quantity::from_milli(-1500)), "-1.5");
        assert_eq!(format!("{}", Quantity::zero()), "0");
    }

    #[test]
    fn test_arithmetic_and_scale() {
        let a = Quantity::from_whole(10);
        let b = Quantity::from_whole(6);
        assert_eq!((a - b).milli(), 4000);
        assert_eq!((a + b).milli(), 16000);
        assert_eq!((-b).milli(), -6000);
        assert_eq!(Quantity::from_whole(2).scale(3).milli(), 6000);
    }

    #[test]
    fn test_cost_at() {
        // 2 kg at €3.00/kg = €6.00
        let q = Quantity::from_whole(2);
        assert_eq!(q.cost_at(Money::from_cents(300)).cents(), 600);

        // 333 g at €3.00/kg = 99.9 cents → rounds to €1.00
        let q = Quantity::from_milli(333);
        assert_eq!(q.cost_at(Money::from_cents(300)).cents(), 100);
    }

    #[test]
    fn test_signed_ledger_sum_is_exact() {
        // A depletion followed by the exact compensation nets to zero.
        let depletion = -Quantity::from_milli(6000);
        let compensation = Quantity::from_milli(6000);
        assert_eq!((depletion + compensation).milli(), 0);
    }
}
