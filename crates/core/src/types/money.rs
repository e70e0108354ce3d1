//! Money helpers using decimal arithmetic.
//!
//! Prices travel through the storefront in major currency units (`129.99`)
//! and are converted to minor units (cents) only at the payment processor
//! boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting between major and minor currency units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount does not fit in an `i64` number of minor units.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),

    /// A line total or sum exceeded what a `Decimal` can hold.
    #[error("amount is too large")]
    Overflow,
}

/// `price * quantity`, failing instead of overflowing.
///
/// # Errors
///
/// Returns `MoneyError::Overflow` if the product does not fit in a `Decimal`.
pub fn line_amount(price: Decimal, quantity: u32) -> Result<Decimal, MoneyError> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or(MoneyError::Overflow)
}

/// Sum of `amounts`, failing instead of overflowing.
///
/// # Errors
///
/// Returns the first error in `amounts`, or `MoneyError::Overflow` if the
/// sum does not fit in a `Decimal`.
pub fn checked_sum<I>(amounts: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = Result<Decimal, MoneyError>>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount?).ok_or(MoneyError::Overflow)
    })
}

/// Convert a major-unit amount to minor units, rounding half away from zero.
///
/// `19.995` becomes `2000`; `10` becomes `1000`.
///
/// # Errors
///
/// Returns `MoneyError::OutOfRange` if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or(MoneyError::OutOfRange(amount))
}

/// Convert a minor-unit amount (cents) back to major units.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as the payment processor expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}
