//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A credit ledger that leaks fractions of a qəpik per payment will       │
//! │  eventually disagree with its own audit history — which this system     │
//! │  treats as a correctness bug, not a rounding curiosity.                 │
//! │                                                                         │
//! │  OUR SOLUTION: integer qəpik (smallest currency unit)                   │
//! │    remaining − payment is exact, replayable, and comparable             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kassa_core::money::Money;
//!
//! let credit = Money::from_qepik(100_000); // ₼1000.00
//! let payment = Money::from_qepik(40_000); // ₼400.00
//! assert_eq!((credit - payment).qepik(), 60_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (qəpik).
///
/// ## Design Decisions
/// - **i64 (signed)**: payment history stores reversals as negative deltas
/// - **Single-field tuple struct**: zero-cost abstraction over i64
/// - **`sqlx(transparent)`**: persists as a plain INTEGER column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from qəpik (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    ///
    /// let price = Money::from_qepik(1099); // ₼10.99
    /// assert_eq!(price.qepik(), 1099);
    /// ```
    #[inline]
    pub const fn from_qepik(qepik: i64) -> Self {
        Money(qepik)
    }

    /// Creates a Money value from major and minor units (manat and qəpik).
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` = −₼5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in qəpik.
    #[inline]
    pub const fn qepik(&self) -> i64 {
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

    /// Returns the smaller of two values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Checked subtraction: `None` when the result would go negative.
    ///
    /// The ledger uses this instead of plain `-` so that "remaining
    /// balance never goes below zero" is enforced by the type, not by
    /// caller discipline.
    #[inline]
    pub const fn checked_sub_to_zero(self, other: Self) -> Option<Self> {
        let result = self.0 - other.0;
        if result < 0 {
            None
        } else {
            Some(Money(result))
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the value in major.minor form. Debugging only; UI
/// formatting and localization belong to the consuming application.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation is used when a payment is recorded as a reversal delta in
/// the audit history.
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_qepik() {
        let money = Money::from_qepik(1099);
        assert_eq!(money.qepik(), 1099);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).qepik(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).qepik(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_qepik(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_qepik(500)), "5.00");
        assert_eq!(format!("{}", Money::from_qepik(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_qepik(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_qepik(1000);
        let b = Money::from_qepik(400);

        assert_eq!((a + b).qepik(), 1400);
        assert_eq!((a - b).qepik(), 600);
        assert_eq!((-b).qepik(), -400);
    }

    #[test]
    fn test_checked_sub_to_zero() {
        let remaining = Money::from_qepik(600);

        assert_eq!(
            remaining.checked_sub_to_zero(Money::from_qepik(600)),
            Some(Money::zero())
        );
        assert_eq!(remaining.checked_sub_to_zero(Money::from_qepik(601)), None);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_qepik(100).is_positive());
        assert!(Money::from_qepik(-100).is_negative());
    }

    #[test]
    fn test_min() {
        let a = Money::from_qepik(1000);
        let b = Money::from_qepik(400);
        assert_eq!(a.min(b), b);
    }
}
