//! Type-safe VND price representation using decimal arithmetic.
//!
//! The shop sells in Vietnamese dong only. The backend sends prices as
//! decimal strings (`"295000.00"`) and the payment gateway reports amounts
//! in minor units (hundredths), so both conversions live here.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount of Vietnamese dong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero dong.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount in dong.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of dong.
    #[must_use]
    pub fn from_dong(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }

    /// Create a price from minor units (hundredths of a dong).
    ///
    /// VNPay reports `vnp_Amount` this way: `29500000` is 295 000 ₫.
    #[must_use]
    pub fn from_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, 2).normalize())
    }

    /// Parse a backend decimal string, falling back to zero.
    ///
    /// Unparsable prices are shown as 0 ₫ rather than failing the page.
    #[must_use]
    pub fn parse_or_zero(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::ZERO)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Amount without trailing zeros, as used in query strings (`295000`).
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Formats like `vi-VN` currency output: `1.250.000 ₫`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let digits = rounded.abs().trunc().to_string();

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        if rounded.is_sign_negative() && !rounded.is_zero() {
            write!(f, "-{grouped} ₫")
        } else {
            write!(f, "{grouped} ₫")
        }
    }
}
