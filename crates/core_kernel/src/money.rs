//! Money type with exact two-decimal arithmetic
//!
//! This module provides the single monetary value used by the ledger. Amounts
//! are backed by rust_decimal and always carry at most two decimal places, so
//! balances compare exactly to the cent and never drift the way floats do.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use thiserror::Error;

/// Number of decimal places every amount is kept at
pub const MONEY_SCALE: u32 = 2;

/// Largest single amount the ledger stores, in cents (9 999 999 999.99)
pub const MAX_MINOR_UNITS: i64 = 999_999_999_999;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Too many decimal places in {0}: at most {MONEY_SCALE} are allowed")]
    TooPrecise(Decimal),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in the institute's single billing currency
///
/// Construction through [`Money::new`] rounds half away from zero to cents.
/// Untrusted input should go through [`Money::try_new`], which rejects values
/// with sub-cent precision instead of silently rounding them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Creates a new Money value, rounded to cents
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Creates a Money value from caller-supplied input
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::TooPrecise` if the amount has more than two
    /// significant decimal places.
    pub fn try_new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.normalize().scale() > MONEY_SCALE {
            return Err(MoneyError::TooPrecise(amount));
        }
        Ok(Self::new(amount))
    }

    /// Creates Money from an integer amount in cents
    pub fn from_minor(minor_units: i64) -> Self {
        Self(Decimal::new(minor_units, MONEY_SCALE))
    }

    /// The largest amount a single receivable or payment may carry
    pub fn max_amount() -> Self {
        Self::from_minor(MAX_MINOR_UNITS)
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Checked addition that reports overflow instead of panicking
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction that reports overflow instead of panicking
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Sums amounts, reporting overflow instead of panicking
    pub fn checked_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(&amount))
    }

    /// Divides by a scalar, rounding the quotient to cents
    pub fn divide(&self, divisor: Decimal) -> Result<Money, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        self.0
            .checked_div(divisor)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Splits the amount into `parts` installments
    ///
    /// Every part except the last is `round(self / parts)`; the last part is
    /// whatever remains, so the parts always sum back to `self` exactly.
    pub fn split(&self, parts: u32) -> Result<Vec<Money>, MoneyError> {
        if parts == 0 {
            return Err(MoneyError::InvalidAmount("Cannot split into zero parts".to_string()));
        }

        let base = self.divide(Decimal::from(parts))?;
        let mut allocated = Money::zero();
        let mut result = Vec::with_capacity(parts as usize);

        for _ in 1..parts {
            allocated = allocated.checked_add(&base)?;
            result.push(base);
        }
        result.push(self.checked_sub(&allocated)?);

        Ok(result)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Decimal {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}
