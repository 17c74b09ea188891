//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Backend prices arrive as JSON numbers: 1250.5                          │
//! │  As f64, 0.1 + 0.2 = 0.30000000000000004  ❌                            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    "1250.5" with 2 decimals  → 125050 minor units                       │
//! │    "500"    with 0 decimals  → 500 minor units (TZS, UGX, ...)          │
//! │    The text is parsed digit by digit, never through a float.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rxdesk_core::money::{CurrencyFormat, Money};
//!
//! let price = Money::from_minor(500);
//! let line_total = price.multiply_quantity(2);
//! assert_eq!(line_total.minor(), 1000);
//!
//! let tzs = CurrencyFormat::new("TZS", 0);
//! assert_eq!(tzs.format(line_total), "TZS 1,000");
//! ```

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// The currency itself is not stored: a till works in exactly one currency,
/// carried by [`CurrencyFormat`] in the checkout context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use rxdesk_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(299);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Parses a decimal amount written in major units.
    ///
    /// Accepts an optional leading `-`, digits, and an optional fractional
    /// part. Fractional digits beyond `decimals` are rounded half away from
    /// zero on the first dropped digit.
    ///
    /// ## Example
    /// ```rust
    /// use rxdesk_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12.5", 2).unwrap().minor(), 1250);
    /// assert_eq!(Money::parse_decimal("500.00", 0).unwrap().minor(), 500);
    /// assert_eq!(Money::parse_decimal("0.125", 2).unwrap().minor(), 13);
    /// assert!(Money::parse_decimal("12,5", 2).is_err());
    /// ```
    pub fn parse_decimal(text: &str, decimals: u8) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("{} ('{}')", reason, text),
        };

        let trimmed = text.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("empty amount"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a decimal number"));
        }

        let scale = 10_i64.pow(decimals as u32);
        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };

        let digits: Vec<u32> = fraction.chars().filter_map(|c| c.to_digit(10)).collect();
        let mut frac_value: i64 = 0;
        for i in 0..decimals as usize {
            frac_value = frac_value * 10 + digits.get(i).copied().unwrap_or(0) as i64;
        }
        if digits.get(decimals as usize).copied().unwrap_or(0) >= 5 {
            frac_value += 1;
        }

        let minor = whole_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Money(if negative { -minor } else { minor }))
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Currency Format
// =============================================================================

/// How amounts are written for the till's currency.
///
/// ## Example
/// ```rust
/// use rxdesk_core::money::{CurrencyFormat, Money};
///
/// let usd = CurrencyFormat::new("USD", 2);
/// assert_eq!(usd.format(Money::from_minor(123456)), "USD 1,234.56");
/// assert_eq!(usd.format_amount(Money::from_minor(-550)), "-5.50");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyFormat {
    /// ISO 4217 code, printed before the amount.
    pub code: String,

    /// Number of minor-unit digits (0 for TZS, 2 for USD).
    pub decimals: u8,
}

impl CurrencyFormat {
    pub fn new(code: impl Into<String>, decimals: u8) -> Self {
        CurrencyFormat {
            code: code.into(),
            decimals,
        }
    }

    /// Formats an amount with thousands separators and the currency code.
    pub fn format(&self, amount: Money) -> String {
        format!("{} {}", self.code, self.grouped(amount))
    }

    /// Formats the bare amount without grouping or code, e.g. `1250.50`.
    pub fn format_amount(&self, amount: Money) -> String {
        let (sign, whole, frac) = self.split(amount);
        match frac {
            Some(frac) => format!("{}{}.{}", sign, whole, frac),
            None => format!("{}{}", sign, whole),
        }
    }

    /// Parses a decimal string in this currency.
    pub fn parse(&self, text: &str) -> Result<Money, ValidationError> {
        Money::parse_decimal(text, self.decimals)
    }

    fn grouped(&self, amount: Money) -> String {
        let (sign, whole, frac) = self.split(amount);
        let digits = whole.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        match frac {
            Some(frac) => format!("{}{}.{}", sign, grouped, frac),
            None => format!("{}{}", sign, grouped),
        }
    }

    fn split(&self, amount: Money) -> (&'static str, u64, Option<String>) {
        let sign = if amount.is_negative() { "-" } else { "" };
        let abs = amount.minor().unsigned_abs();
        if self.decimals == 0 {
            return (sign, abs, None);
        }
        let scale = 10_u64.pow(self.decimals as u32);
        let frac = format!("{:0width$}", abs % scale, width = self.decimals as usize);
        (sign, abs / scale, Some(frac))
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        CurrencyFormat::new("TZS", 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_parse_decimal_zero_decimals() {
        assert_eq!(Money::parse_decimal("500", 0).unwrap().minor(), 500);
        assert_eq!(Money::parse_decimal("500.4", 0).unwrap().minor(), 500);
        assert_eq!(Money::parse_decimal("500.5", 0).unwrap().minor(), 501);
    }

    #[test]
    fn test_parse_decimal_two_decimals() {
        assert_eq!(Money::parse_decimal("10.99", 2).unwrap().minor(), 1099);
        assert_eq!(Money::parse_decimal("10.9", 2).unwrap().minor(), 1090);
        assert_eq!(Money::parse_decimal(".5", 2).unwrap().minor(), 50);
        assert_eq!(Money::parse_decimal("-5.50", 2).unwrap().minor(), -550);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(Money::parse_decimal("", 2).is_err());
        assert!(Money::parse_decimal("abc", 2).is_err());
        assert!(Money::parse_decimal("1.2.3", 2).is_err());
        assert!(Money::parse_decimal("99999999999999999999", 2).is_err());
    }

    #[test]
    fn test_format_grouping() {
        let tzs = CurrencyFormat::new("TZS", 0);
        assert_eq!(tzs.format(Money::from_minor(0)), "TZS 0");
        assert_eq!(tzs.format(Money::from_minor(1200)), "TZS 1,200");
        assert_eq!(tzs.format(Money::from_minor(1234567)), "TZS 1,234,567");
        assert_eq!(tzs.format_amount(Money::from_minor(600)), "600");
    }

    #[test]
    fn test_format_with_decimals() {
        let usd = CurrencyFormat::new("USD", 2);
        assert_eq!(usd.format(Money::from_minor(1)), "USD 0.01");
        assert_eq!(usd.format(Money::from_minor(-123456)), "USD -1,234.56");
        assert_eq!(usd.format_amount(Money::from_minor(1099)), "10.99");
    }
}
