//! In-memory snapshot of everything the engine reads, loaded from and saved to the stores.

use isa_domain::{Contribution, FlexibilitySettings, TaxYear, Withdrawal};

use crate::{
    ledger_service::ContributionLedger,
    storage::{book_warnings, ContributionStore, FlexibilityStore, WithdrawalStore},
    CoreError,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsaBook {
    pub contributions: Vec<Contribution>,
    pub withdrawals: Vec<Withdrawal>,
    pub flexibility: FlexibilitySettings,
}

impl IsaBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<S>(store: &S) -> Result<Self, CoreError>
    where
        S: ContributionStore + WithdrawalStore + FlexibilityStore + ?Sized,
    {
        let book = Self {
            contributions: store.load_contributions()?,
            withdrawals: store.load_withdrawals()?,
            flexibility: store.load_flexibility()?,
        };
        for warning in book.warnings() {
            tracing::warn!(%warning, "loaded book has anomalies");
        }
        tracing::debug!(
            contributions = book.contributions.len(),
            withdrawals = book.withdrawals.len(),
            "book loaded"
        );
        Ok(book)
    }

    /// Writes policies, then withdrawals, then contributions. A failure part way
    /// leaves the contribution log unchanged, so no deposit is stored without
    /// the policy or withdrawal it was checked against.
    pub fn save<S>(&self, store: &S) -> Result<(), CoreError>
    where
        S: ContributionStore + WithdrawalStore + FlexibilityStore + ?Sized,
    {
        store.save_flexibility(&self.flexibility)?;
        store.save_withdrawals(&self.withdrawals)?;
        store.save_contributions(&self.contributions)
    }

    pub fn warnings(&self) -> Vec<String> {
        book_warnings(&self.contributions, &self.withdrawals, &self.flexibility)
    }

    pub fn contributions_in(&self, tax_year: &TaxYear) -> Vec<&Contribution> {
        ContributionLedger::filter_by_tax_year(&self.contributions, tax_year)
    }

    /// Tax years with at least one recorded event, newest first.
    pub fn active_tax_years(&self) -> Vec<TaxYear> {
        let mut years: Vec<TaxYear> = self
            .contributions
            .iter()
            .filter(|c| !c.deleted)
            .map(Contribution::tax_year)
            .chain(self.withdrawals.iter().map(Withdrawal::tax_year))
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }
}
