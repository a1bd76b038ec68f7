//! Shared traits, money helpers, and allowance constants.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use uuid::Uuid;

/// Annual ISA subscription allowance across all ISA types, in pounds.
pub const DEFAULT_ANNUAL_ALLOWANCE: Decimal = Decimal::from_parts(20_000, 0, 0, false, 0);

/// Annual cap on Lifetime ISA subscriptions, counted inside the overall allowance.
pub const DEFAULT_LIFETIME_ALLOWANCE: Decimal = Decimal::from_parts(4_000, 0, 0, false, 0);

/// Exposes a stable identifier for entities stored in the ledger.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Supplies a common contract for retrieving monetary amounts.
pub trait Amounted {
    fn amount(&self) -> Decimal;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Errors raised while validating a monetary amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    NotNumeric(String),
    NotPositive(Decimal),
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::NotNumeric(raw) => write!(f, "`{raw}` is not a valid amount"),
            AmountError::NotPositive(_) => f.write_str("amount must be positive"),
        }
    }
}

impl std::error::Error for AmountError {}

/// Ensures the amount is strictly positive.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    Ok(amount)
}

/// Parses user input such as `1500`, `£1,500.50` or ` 20 000 ` into a positive amount.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('£')
        .chars()
        .filter(|ch| !matches!(ch, ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return Err(AmountError::NotNumeric(raw.trim().to_string()));
    }
    let amount = Decimal::from_str(&cleaned)
        .map_err(|_| AmountError::NotNumeric(raw.trim().to_string()))?;
    validate_amount(amount)
}

/// Sums amounts exactly; the empty sum is zero.
pub fn sum_amounts<'a, T, I>(items: I) -> Decimal
where
    T: Amounted + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .fold(Decimal::ZERO, |acc, item| acc + item.amount())
}
