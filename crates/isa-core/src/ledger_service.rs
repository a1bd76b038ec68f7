//! Grouping, filtering and aggregation over the contribution log.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use isa_domain::{
    same_provider, sum_amounts, Contribution, Identifiable, IsaType, PolicyViolation, TaxYear,
    Withdrawal,
};

use crate::CoreError;

/// Total paid into one provider for a given ISA type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderTotal {
    pub provider: String,
    pub total: Decimal,
}

/// Provider totals for one ISA type, in first-seen order, plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeTotals {
    pub providers: Vec<ProviderTotal>,
    pub grand_total: Decimal,
}

impl TypeTotals {
    fn add(&mut self, provider: &str, amount: Decimal) {
        match self
            .providers
            .iter_mut()
            .find(|entry| same_provider(&entry.provider, provider))
        {
            Some(entry) => entry.total += amount,
            None => self.providers.push(ProviderTotal {
                provider: provider.to_string(),
                total: amount,
            }),
        }
        self.grand_total += amount;
    }

    pub fn provider_total(&self, provider: &str) -> Decimal {
        self.providers
            .iter()
            .find(|entry| same_provider(&entry.provider, provider))
            .map(|entry| entry.total)
            .unwrap_or(Decimal::ZERO)
    }
}

pub type TypeBreakdown = BTreeMap<IsaType, TypeTotals>;

/// A tax year whose eligible contributions exceed the allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowanceBreach {
    pub tax_year: TaxYear,
    pub contributed: Decimal,
    pub allowance: Decimal,
    pub excess: Decimal,
}

/// Stateless helpers over contribution and withdrawal slices.
pub struct ContributionLedger;

impl ContributionLedger {
    /// Per-type provider totals over eligible entries only.
    pub fn group_by_type_and_provider<'a, I>(contributions: I) -> TypeBreakdown
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        let mut breakdown = TypeBreakdown::new();
        for contribution in contributions.into_iter().filter(|c| c.is_eligible()) {
            breakdown
                .entry(contribution.isa_type)
                .or_default()
                .add(&contribution.provider, contribution.amount);
        }
        breakdown
    }

    /// Keeps entries dated inside `tax_year`, regardless of their soft flags.
    pub fn filter_by_tax_year<'a, I>(contributions: I, tax_year: &TaxYear) -> Vec<&'a Contribution>
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        contributions
            .into_iter()
            .filter(|contribution| tax_year.contains(contribution.date))
            .collect()
    }

    /// Sum of eligible amounts; zero for an empty input.
    pub fn total_contributed<'a, I>(contributions: I) -> Decimal
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        sum_amounts(
            contributions
                .into_iter()
                .filter(|contribution| contribution.is_eligible()),
        )
    }

    /// Eligible totals per tax year. Years without contributions are absent.
    pub fn by_tax_year<'a, I>(contributions: I) -> BTreeMap<TaxYear, Decimal>
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        let mut totals = BTreeMap::new();
        for contribution in contributions.into_iter().filter(|c| c.is_eligible()) {
            *totals
                .entry(contribution.tax_year())
                .or_insert(Decimal::ZERO) += contribution.amount;
        }
        totals
    }

    /// Tax years whose eligible totals exceed `allowance`. Reported, never corrected.
    pub fn allowance_breaches<'a, I>(contributions: I, allowance: Decimal) -> Vec<AllowanceBreach>
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        Self::by_tax_year(contributions)
            .into_iter()
            .filter(|(_, contributed)| *contributed > allowance)
            .map(|(tax_year, contributed)| {
                tracing::warn!(
                    tax_year = %tax_year,
                    contributed = %contributed,
                    allowance = %allowance,
                    "contributions exceed the annual allowance"
                );
                AllowanceBreach {
                    tax_year,
                    contributed,
                    allowance,
                    excess: contributed - allowance,
                }
            })
            .collect()
    }

    /// Withdrawals from `{provider, isa_type}` dated inside `tax_year`.
    pub fn withdrawals_for<'a>(
        withdrawals: &'a [Withdrawal],
        tax_year: &TaxYear,
        provider: &str,
        isa_type: IsaType,
    ) -> Vec<&'a Withdrawal> {
        withdrawals
            .iter()
            .filter(|withdrawal| {
                withdrawal.is_from(provider, isa_type) && tax_year.contains(withdrawal.date)
            })
            .collect()
    }

    pub fn total_withdrawn<'a, I>(withdrawals: I) -> Decimal
    where
        I: IntoIterator<Item = &'a Withdrawal>,
    {
        sum_amounts(withdrawals)
    }

    /// At most one Lifetime ISA provider may be held at a time.
    pub fn lifetime_provider_conflict(
        contributions: &[Contribution],
        provider: &str,
    ) -> Result<(), PolicyViolation> {
        let existing = contributions.iter().find(|contribution| {
            !contribution.deleted
                && contribution.isa_type == IsaType::Lifetime
                && !contribution.is_with(provider)
        });
        match existing {
            Some(held) => Err(PolicyViolation::SecondLifetimeProvider {
                existing: held.provider.clone(),
                requested: provider.trim().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Appends a contribution and returns its identifier.
    pub fn record(log: &mut Vec<Contribution>, contribution: Contribution) -> Uuid {
        let id = contribution.id;
        tracing::debug!(
            %id,
            provider = %contribution.provider,
            amount = %contribution.amount,
            "recording contribution"
        );
        log.push(contribution);
        id
    }

    /// Flags a contribution as deleted; it stays in the log for audit.
    pub fn soft_delete(log: &mut [Contribution], id: Uuid) -> Result<(), CoreError> {
        Self::update(log, id, |contribution| contribution.deleted = true)
    }

    pub fn mark_withdrawn(log: &mut [Contribution], id: Uuid) -> Result<(), CoreError> {
        Self::update(log, id, |contribution| contribution.withdrawn = true)
    }

    /// Clears both soft flags.
    pub fn restore(log: &mut [Contribution], id: Uuid) -> Result<(), CoreError> {
        Self::update(log, id, |contribution| {
            contribution.deleted = false;
            contribution.withdrawn = false;
        })
    }

    /// Resolves a full id or unique id prefix to an entry id.
    pub fn resolve_id<T: Identifiable>(log: &[T], prefix: &str) -> Result<Uuid, CoreError> {
        let needle = prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(CoreError::Validation("id must not be empty".into()));
        }
        let mut matches = log
            .iter()
            .filter(|entry| entry.id().to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found.id()),
            (Some(_), Some(_)) => Err(CoreError::InvalidOperation(format!(
                "id prefix `{needle}` matches more than one entry"
            ))),
            (None, _) => Err(CoreError::Validation(format!(
                "no id starts with `{needle}`"
            ))),
        }
    }

    fn update<F>(log: &mut [Contribution], id: Uuid, mutator: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Contribution),
    {
        let contribution = log
            .iter_mut()
            .find(|contribution| contribution.id == id)
            .ok_or(CoreError::ContributionNotFound(id))?;
        mutator(contribution);
        Ok(())
    }
}
