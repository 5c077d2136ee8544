//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Whole Currency Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE STORE CURRENCY HAS NO SUBUNIT                                      │
//! │                                                                         │
//! │  Every price, fee, discount and expense is a whole number of units:    │
//! │    15000 + 2 × 12000 = 39000                                            │
//! │                                                                         │
//! │  Fractions only appear inside a calculation (10% of 12345, 2% fee)     │
//! │  and are resolved immediately with round-half-up:                       │
//! │    12345 × 10% = 1234.5 → 1235                                          │
//! │                                                                         │
//! │  No floating point ever touches an amount. Floats are reserved for     │
//! │  derived percentages (profit margin, category share) in reports.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use toyshop_core::money::Money;
//!
//! let price = Money::from_units(15_000);
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.units(), 30_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole currency units.
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results such as `profit` may be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Newtype serde**: serialized as a plain integer
/// - **Saturating operators**: amounts read back from the store are not
///   trusted to be small, so `+`, `-` and `×` clamp at the i64 bounds
///
/// ## Where Money is Used
/// ```text
/// CartLine.unit_price ──► subtotal ──► + shipping ──► − discount ──► total
///                                                                     │
///                               absorb_processor_fee(total, 2%) ◄─────┘
///                                                                     │
///                               rescaled gateway line items ◄─────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use toyshop_core::money::Money;
    ///
    /// let price = Money::from_units(12_000);
    /// assert_eq!(price.units(), 12_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in whole currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
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
        Money(self.0.abs())
    }

    /// Floors the value at zero.
    ///
    /// ```rust
    /// use toyshop_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(-500).non_negative(), Money::zero());
    /// assert_eq!(Money::from_units(500).non_negative().units(), 500);
    /// ```
    #[inline]
    pub fn non_negative(self) -> Self {
        self.max(Money::zero())
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    ///
    /// ## Example
    /// ```rust
    /// use toyshop_core::money::Money;
    ///
    /// let unit_price = Money::from_units(12_000);
    /// assert_eq!(unit_price.multiply_quantity(2).units(), 24_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Takes `pct` percent of the amount, rounding half up once on the exact
    /// product.
    ///
    /// `pct` is read as the decimal it prints as (`12.345`), not as its
    /// binary approximation. Non-finite or non-positive percentages give zero.
    ///
    /// ```rust
    /// use toyshop_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(39_000).apply_percentage(10.0).units(), 3_900);
    /// assert_eq!(Money::from_units(100_000).apply_percentage(12.345).units(), 12_345);
    /// assert_eq!(Money::from_units(30_000).apply_percentage(33.333).units(), 10_000);
    /// ```
    pub fn apply_percentage(&self, pct: f64) -> Money {
        if !pct.is_finite() || pct <= 0.0 || self.0 <= 0 {
            return Money::zero();
        }

        let exact = decimal_digits(pct).and_then(|(digits, scale)| {
            let num = (self.0 as i128).checked_mul(digits)?;
            let den = 100_i128.checked_mul(10_i128.checked_pow(scale)?)?;
            let rounded = num.checked_mul(2)?.checked_add(den)? / den.checked_mul(2)?;
            Some(i64::try_from(rounded).unwrap_or(i64::MAX))
        });

        // Pathological magnitudes only; `as` saturates.
        let units = exact.unwrap_or_else(|| (self.0 as f64 * pct / 100.0).round() as i64);
        Money::from_units(units)
    }

    /// Divides by `1 + rate` and rounds half up.
    ///
    /// This is the inverse of adding a percentage fee: the returned amount
    /// `x` satisfies `x × (1 + rate) ≈ self` within one unit.
    ///
    /// ```rust
    /// use toyshop_core::money::Money;
    /// use toyshop_core::types::Rate;
    ///
    /// let target = Money::from_units(35_100);
    /// let requested = target.divide_by_one_plus(Rate::from_bps(200));
    /// assert_eq!(requested.units(), 34_412); // 35100 / 1.02 = 34411.76
    /// ```
    pub fn divide_by_one_plus(&self, rate: Rate) -> Money {
        let denominator = 10_000_i128 + rate.bps() as i128;
        let numerator = self.0 as i128 * 10_000;
        Money::from_units(((2 * numerator + denominator) / (2 * denominator)) as i64)
    }

    /// Multiplies by the ratio `numerator / denominator`, rounding half up.
    ///
    /// Returns `None` when the denominator is not positive.
    ///
    /// ```rust
    /// use toyshop_core::money::Money;
    ///
    /// let unit = Money::from_units(15_000);
    /// let scaled = unit.scale(Money::from_units(34_412), Money::from_units(39_000));
    /// assert_eq!(scaled.map(|m| m.units()), Some(13_235)); // 13235.38
    /// ```
    pub fn scale(&self, numerator: Money, denominator: Money) -> Option<Money> {
        if !denominator.is_positive() {
            return None;
        }
        let num = self.0 as i128 * numerator.0 as i128;
        let den = denominator.0 as i128;
        Some(Money::from_units(((2 * num + den) / (2 * den)) as i64))
    }

    /// Expresses this amount as a percentage of `whole`.
    ///
    /// Returns `0.0` when `whole` is not positive. The result is not rounded;
    /// rounding is a presentation concern.
    pub fn percentage_of(&self, whole: Money) -> f64 {
        if !whole.is_positive() {
            return 0.0;
        }
        self.0 as f64 / whole.0 as f64 * 100.0
    }
}

/// Splits a positive float into its shortest decimal digits and the number of
/// fractional digits: `12.345` → `(12345, 3)`.
fn decimal_digits(value: f64) -> Option<(i128, u32)> {
    let printed = value.to_string();
    let (int_part, frac_part) = printed.split_once('.').unwrap_or((printed.as_str(), ""));
    let scale = u32::try_from(frac_part.len()).ok()?;
    let digits = format!("{}{}", int_part, frac_part).parse::<i128>().ok()?;
    Some((digits, scale))
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display groups thousands with commas (`35,100`).
///
/// ## Note
/// This is for logs and debugging. Localized formatting with the currency
/// symbol happens in the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}", sign, grouped)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
