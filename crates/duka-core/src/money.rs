//! # Money Module
//!
//! Provides the `Money` type for monetary values in the ledger.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BALANCES MUST RECONCILE EXACTLY                                        │
//! │                                                                         │
//! │  A customer statement sums charges and payments one by one.            │
//! │  With floats, 0.1 + 0.2 = 0.30000000000000004 and the closing          │
//! │  running balance drifts away from Σ(sale balances).                    │
//! │                                                                         │
//! │  OUR SOLUTION: integer count of the currency's minor unit              │
//! │    TZS has no minor unit in practice, so 35,000 TZS = Money(35000)     │
//! │    USD would be cents: $10.99 = Money(1099)                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::money::Money;
//!
//! let unit_price = Money::from_minor(35_000);
//! let total = unit_price.multiply_quantity(2);
//! assert_eq!(total.minor(), 70_000);
//!
//! let paid: Money = [Money::from_minor(20_000), Money::from_minor(10_000)]
//!     .into_iter()
//!     .sum();
//! assert_eq!((total - paid).minor(), 40_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of the shop's currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: running balances and profit can go negative
/// - **Saturating operators**: `+`, `-`, `*` and `Sum` stop at the i64
///   bounds instead of panicking. Validated prices keep every line total
///   far below them; only hand-edited backups can get close. Use
///   [`Money::checked_add`] where an overflow must become an error.
/// - **Newtype serde**: serializes as a bare JSON number, matching
///   backup files written by the web app
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.selling_price ──► Sale.unit_price ──► Sale.total_amount        │
/// │                                                   │                     │
/// │  Payment.amount ──────────────────────────────────┤                     │
/// │                                                   ▼                     │
/// │                                   balance = total − Σ payments          │
/// │                                                   │                     │
/// │                        customer balance / statement / dashboard         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
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
        Money(self.0.saturating_abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(8_000);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 24_000);
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, quantity: i64) -> Money {
        Money(self.0.saturating_mul(quantity))
    }

    /// Adds two values, returning `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let a = Money::from_minor(i64::MAX);
    /// assert!(a.checked_add(Money::from_minor(1)).is_none());
    /// assert_eq!(
    ///     Money::from_minor(2).checked_add(Money::from_minor(3)),
    ///     Some(Money::from_minor(5))
    /// );
    /// ```
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    ///
    /// Used when computing `totalAmount` from user input, where a typo can
    /// produce a value outside `i64`.
    #[inline]
    pub fn checked_multiply_quantity(&self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

/// Formats money with thousands separators (e.g. "35,000", "-1,250").
///
/// Currency symbols and decimal placement are a presentation concern and
/// belong to the UI.
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

        if self.0 < 0 {
            write!(f, "-{}", grouped)
        } else {
            write!(f, "{}", grouped)
        }
    }
}

// =============================================================================
// Arithmetic Operations
// =============================================================================

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Money) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Money) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, quantity: i64) -> Money {
        Money(self.0.saturating_mul(quantity))
    }
}

impl Neg for Money {
    type Output = Money;

    #[inline]
    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let m = Money::from_minor(35_000);
        assert_eq!(m.minor(), 35_000);
        assert!(m.is_positive());
        assert!(!m.is_zero());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(300);

        assert_eq!((a + b).minor(), 1300);
        assert_eq!((a - b).minor(), 700);
        assert_eq!((b - a).minor(), -700);
        assert_eq!((a * 3).minor(), 3000);
        assert_eq!((-a).minor(), -1000);

        let mut c = a;
        c += b;
        c -= Money::from_minor(100);
        assert_eq!(c.minor(), 1200);
    }

    #[test]
    fn test_sum() {
        let payments = vec![
            Money::from_minor(20_000),
            Money::from_minor(5_000),
            Money::from_minor(2_500),
        ];
        let by_ref: Money = payments.iter().sum();
        let by_value: Money = payments.into_iter().sum();
        assert_eq!(by_ref.minor(), 27_500);
        assert_eq!(by_value, by_ref);

        let empty: Money = Vec::<Money>::new().into_iter().sum();
        assert!(empty.is_zero());
    }

    #[test]
    fn test_checked_multiply_overflow() {
        let price = Money::from_minor(i64::MAX / 2);
        assert!(price.checked_multiply_quantity(3).is_none());
        assert_eq!(
            Money::from_minor(8_000).checked_multiply_quantity(2),
            Some(Money::from_minor(16_000))
        );
    }

    #[test]
    fn test_operators_saturate_at_bounds() {
        let max = Money::from_minor(i64::MAX);
        let min = Money::from_minor(i64::MIN);

        assert_eq!(max + max, max);
        assert_eq!(min - max, min);
        assert_eq!(max * 2, max);
        assert_eq!(min.multiply_quantity(2), min);
        assert_eq!(-min, max);

        let total: Money = [max, max, Money::from_minor(5)].into_iter().sum();
        assert_eq!(total, max);
    }

    #[test]
    fn test_checked_add() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.checked_add(max), None);
        assert_eq!(
            Money::from_minor(7_000).checked_add(Money::from_minor(3_000)),
            Some(Money::from_minor(10_000))
        );
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(Money::from_minor(0).to_string(), "0");
        assert_eq!(Money::from_minor(999).to_string(), "999");
        assert_eq!(Money::from_minor(35_000).to_string(), "35,000");
        assert_eq!(Money::from_minor(1_250_000).to_string(), "1,250,000");
        assert_eq!(Money::from_minor(-1_250).to_string(), "-1,250");
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Money::from_minor(45_000)).unwrap();
        assert_eq!(json, "45000");

        let back: Money = serde_json::from_str("45000").unwrap();
        assert_eq!(back.minor(), 45_000);
    }
}
