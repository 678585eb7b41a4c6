//! Pricing
//!
//! Fixed-point money helpers shared by the cart, totals and ledger. Amounts are
//! `rusty_money::Money` values; arithmetic that can overflow runs in checked minor units.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{
    Money, MoneyError,
    iso::{CLP, COP, Currency, EUR, GBP, USD},
};
use thiserror::Error;

/// Monetary amount used throughout the engine.
pub type Amount = Money<'static, Currency>;

/// Errors raised by money arithmetic.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Minor-unit arithmetic overflowed `i64`.
    #[error("amount overflowed while computing {0}")]
    Overflow(&'static str),

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Currency code outside the supported set.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Price string could not be parsed.
    #[error("invalid price format: {0}")]
    InvalidPrice(String),

    /// Percentage string could not be parsed.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Resolve a supported ISO currency code.
///
/// # Errors
///
/// Returns [`PricingError::UnknownCurrency`] for codes outside the supported set.
pub fn find_currency(code: &str) -> Result<&'static Currency, PricingError> {
    match code.trim() {
        "CLP" => Ok(CLP),
        "COP" => Ok(COP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        "GBP" => Ok(GBP),
        other => Err(PricingError::UnknownCurrency(other.to_string())),
    }
}

/// Parse a percentage string.
///
/// Accepts two formats:
/// - Percentage format: "19%" for 19%
/// - Decimal format: "0.19" for 19%
///
/// # Errors
///
/// Returns [`PricingError::InvalidPercentage`] if the value cannot be parsed or is negative.
pub fn parse_percentage(s: &str) -> Result<Percentage, PricingError> {
    let trimmed = s.trim();

    let (number, scale) = match trimmed.strip_suffix('%') {
        Some(points) => (points.trim(), Decimal::ONE_HUNDRED),
        None => (trimmed, Decimal::ONE),
    };

    let value = number
        .parse::<Decimal>()
        .map_err(|_err| PricingError::InvalidPercentage(s.to_string()))?;

    if value.is_sign_negative() {
        return Err(PricingError::InvalidPercentage(s.to_string()));
    }

    Ok(Percentage::from(value / scale))
}

/// Parse a price string (e.g. "15000 CLP") into money.
///
/// The amount is given in major units and rounded half-up to the currency's minor unit.
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", the amount
/// cannot be parsed, or the currency is not supported.
pub fn parse_price(s: &str) -> Result<Amount, PricingError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(PricingError::InvalidPrice(s.to_string()));
    };

    let currency = find_currency(code)?;

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| PricingError::InvalidPrice(s.to_string()))?;

    let minor = 10_i64
        .checked_pow(currency.exponent)
        .and_then(|scale| amount.checked_mul(Decimal::from(scale)))
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .ok_or_else(|| PricingError::InvalidPrice(s.to_string()))?;

    Ok(Money::from_minor(minor, currency))
}

/// Zero in the given currency.
#[must_use]
pub fn zero(currency: &'static Currency) -> Amount {
    Money::from_minor(0, currency)
}

/// Returns true if the amount is below zero.
#[must_use]
pub fn is_negative(amount: &Amount) -> bool {
    amount.to_minor_units() < 0
}

/// Unit amount multiplied by a quantity.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the product does not fit in minor units.
pub fn line_total(unit: &Amount, quantity: u32) -> Result<Amount, PricingError> {
    unit.to_minor_units()
        .checked_mul(i64::from(quantity))
        .map(|minor| Money::from_minor(minor, unit.currency()))
        .ok_or(PricingError::Overflow("line total"))
}

/// Sum of amounts, starting from zero in `currency`.
///
/// # Errors
///
/// Returns [`PricingError::Money`] on currency mismatch.
pub fn sum<'i>(
    amounts: impl IntoIterator<Item = &'i Amount>,
    currency: &'static Currency,
) -> Result<Amount, PricingError> {
    amounts
        .into_iter()
        .try_fold(zero(currency), |acc, amount| acc.add(*amount))
        .map_err(PricingError::from)
}

/// Calculate a percentage of a minor unit amount, rounding half-up.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the result cannot be represented in minor units.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, PricingError> {
    let minor = Decimal::from_i64(minor).ok_or(PricingError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage crate doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(PricingError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::PercentConversion)
}

/// Apply a percentage to an amount, rounding half-up to the minor unit.
///
/// # Errors
///
/// Returns [`PricingError::PercentConversion`] if the result cannot be represented.
pub fn percent_of(percent: &Percentage, amount: &Amount) -> Result<Amount, PricingError> {
    let minor = percent_of_minor(percent, amount.to_minor_units())?;

    Ok(Money::from_minor(minor, amount.currency()))
}
