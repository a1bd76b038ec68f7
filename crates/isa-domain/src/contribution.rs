//! Contribution and withdrawal events recorded against an ISA account.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::*, isa_type::IsaType, tax_year::TaxYear};

/// Validation failures raised while building contributions or withdrawals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionError {
    Amount(AmountError),
    MissingProvider,
}

impl fmt::Display for ContributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionError::Amount(err) => err.fmt(f),
            ContributionError::MissingProvider => f.write_str("provider name must not be empty"),
        }
    }
}

impl std::error::Error for ContributionError {}

impl From<AmountError> for ContributionError {
    fn from(err: AmountError) -> Self {
        ContributionError::Amount(err)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn clean_provider(provider: impl Into<String>) -> Result<String, ContributionError> {
    let provider = provider.into().trim().to_string();
    if provider.is_empty() {
        return Err(ContributionError::MissingProvider);
    }
    Ok(provider)
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// One recorded deposit into an ISA.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ContributionRecord")]
pub struct Contribution {
    pub id: Uuid,
    pub isa_type: IsaType,
    pub provider: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub withdrawn: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Contribution {
    /// Builds a contribution, rejecting blank providers and non-positive amounts.
    pub fn new(
        isa_type: IsaType,
        provider: impl Into<String>,
        amount: Decimal,
        date: NaiveDateTime,
    ) -> Result<Self, ContributionError> {
        Ok(Self {
            id: Uuid::new_v4(),
            isa_type,
            provider: clean_provider(provider)?,
            amount: validate_amount(amount)?,
            date,
            notes: None,
            withdrawn: false,
            deleted: false,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = clean_notes(Some(notes.into()));
        self
    }

    /// Eligible entries count towards allowance and score computations.
    pub fn is_eligible(&self) -> bool {
        !self.withdrawn && !self.deleted
    }

    pub fn tax_year(&self) -> TaxYear {
        TaxYear::containing(self.date)
    }

    /// Case-insensitive provider match on trimmed names.
    pub fn is_with(&self, provider: &str) -> bool {
        same_provider(&self.provider, provider)
    }
}

impl Identifiable for Contribution {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for Contribution {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

impl Displayable for Contribution {
    fn display_label(&self) -> String {
        format!(
            "{} {} £{} on {}",
            self.provider,
            self.isa_type,
            self.amount,
            self.date.format("%Y-%m-%d")
        )
    }
}

/// Money taken out of an ISA. Tracked separately from contributions because only
/// flexible accounts may replace it within the same tax year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "WithdrawalRecord")]
pub struct Withdrawal {
    pub id: Uuid,
    pub isa_type: IsaType,
    pub provider: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub date: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Withdrawal {
    pub fn new(
        isa_type: IsaType,
        provider: impl Into<String>,
        amount: Decimal,
        date: NaiveDateTime,
    ) -> Result<Self, ContributionError> {
        Ok(Self {
            id: Uuid::new_v4(),
            isa_type,
            provider: clean_provider(provider)?,
            amount: validate_amount(amount)?,
            date,
            notes: None,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = clean_notes(Some(notes.into()));
        self
    }

    pub fn tax_year(&self) -> TaxYear {
        TaxYear::containing(self.date)
    }

    pub fn is_from(&self, provider: &str, isa_type: IsaType) -> bool {
        self.isa_type == isa_type && same_provider(&self.provider, provider)
    }
}

impl Identifiable for Withdrawal {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Amounted for Withdrawal {
    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Stored form of a [`Contribution`]; loading re-applies the constructor checks.
#[derive(Deserialize)]
struct ContributionRecord {
    id: Uuid,
    isa_type: IsaType,
    provider: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    date: NaiveDateTime,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    withdrawn: bool,
    #[serde(default)]
    deleted: bool,
}

impl TryFrom<ContributionRecord> for Contribution {
    type Error = ContributionError;

    fn try_from(record: ContributionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            isa_type: record.isa_type,
            provider: clean_provider(record.provider)?,
            amount: validate_amount(record.amount)?,
            date: record.date,
            notes: clean_notes(record.notes),
            withdrawn: record.withdrawn,
            deleted: record.deleted,
        })
    }
}

#[derive(Deserialize)]
struct WithdrawalRecord {
    id: Uuid,
    isa_type: IsaType,
    provider: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    date: NaiveDateTime,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<WithdrawalRecord> for Withdrawal {
    type Error = ContributionError;

    fn try_from(record: WithdrawalRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            isa_type: record.isa_type,
            provider: clean_provider(record.provider)?,
            amount: validate_amount(record.amount)?,
            date: record.date,
            notes: clean_notes(record.notes),
        })
    }
}

/// Provider names are free text; compare them trimmed and case-insensitively.
pub fn same_provider(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn new_rejects_non_positive_amounts() {
        let err = Contribution::new(IsaType::Cash, "Nationwide", dec!(0), noon(2024, 5, 1))
            .expect_err("zero must be rejected");
        assert_eq!(
            err,
            ContributionError::Amount(AmountError::NotPositive(dec!(0)))
        );
        assert!(
            Contribution::new(IsaType::Cash, "Nationwide", dec!(-10), noon(2024, 5, 1)).is_err()
        );
    }

    #[test]
    fn new_trims_provider_and_rejects_blank() {
        let contribution =
            Contribution::new(IsaType::Cash, "  Nationwide ", dec!(10), noon(2024, 5, 1))
                .unwrap();
        assert_eq!(contribution.provider, "Nationwide");
        assert_eq!(
            Contribution::new(IsaType::Cash, "   ", dec!(10), noon(2024, 5, 1)).unwrap_err(),
            ContributionError::MissingProvider
        );
    }

    #[test]
    fn serialization_preserves_exact_amount_and_omits_false_flags() {
        let contribution = Contribution::new(
            IsaType::StocksAndShares,
            "Vanguard",
            dec!(1234.57),
            noon(2024, 4, 6),
        )
        .unwrap();
        let json = serde_json::to_string(&contribution).unwrap();
        assert!(json.contains("\"amount\":\"1234.57\""), "json: {json}");
        assert!(json.contains("\"date\":\"2024-04-06T12:00:00\""), "json: {json}");
        assert!(!json.contains("withdrawn"));
        assert!(!json.contains("notes"));

        let decoded: Contribution = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, contribution);
    }

    #[test]
    fn soft_flags_make_entries_ineligible() {
        let mut contribution =
            Contribution::new(IsaType::Cash, "Marcus", dec!(100), noon(2024, 6, 1)).unwrap();
        assert!(contribution.is_eligible());
        contribution.withdrawn = true;
        assert!(!contribution.is_eligible());
        contribution.withdrawn = false;
        contribution.deleted = true;
        assert!(!contribution.is_eligible());
    }

    #[test]
    fn withdrawal_matches_provider_case_insensitively() {
        let withdrawal =
            Withdrawal::new(IsaType::Cash, "Marcus", dec!(50), noon(2024, 6, 1)).unwrap();
        assert!(withdrawal.is_from(" marcus", IsaType::Cash));
        assert!(!withdrawal.is_from("marcus", IsaType::StocksAndShares));
        assert_eq!(withdrawal.tax_year(), TaxYear::new(2024));
    }

    #[test]
    fn stored_records_with_bad_amounts_do_not_load() {
        let stored = r#"{"id":"6f1c1f9e-8d4f-4a4e-9a53-0d6f3f1a2b3c","isa_type":"Cash","provider":"Chip","amount":"-5000","date":"2024-05-01T12:00:00"}"#;
        let err = serde_json::from_str::<Contribution>(stored).unwrap_err();
        assert!(err.to_string().contains("amount must be positive"), "{err}");
        assert!(serde_json::from_str::<Withdrawal>(stored).is_err());

        let blank = stored.replace("\"Chip\"", "\"  \"").replace("-5000", "10");
        assert!(serde_json::from_str::<Contribution>(&blank).is_err());
        let valid = stored.replace("-5000", "5000");
        let loaded: Contribution = serde_json::from_str(&valid).unwrap();
        assert_eq!(loaded.amount, dec!(5000));
        assert!(loaded.is_eligible());
    }
}
