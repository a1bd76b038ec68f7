//! Flexible-ISA allowance calculation.
//!
//! [`evaluate_deposit`] is a pure function over a [`FlexibleIsaState`] snapshot. It never
//! mutates its input and carries no hidden state, so identical inputs always yield
//! identical results. Flexibility itself is a precondition checked by whoever builds
//! the state: withdrawals from a non-flexible account must not be passed in.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use isa_domain::{
    same_provider, sum_amounts, Contribution, FlexibilitySettings, IsaType, TaxYear, Withdrawal,
    DEFAULT_ANNUAL_ALLOWANCE, DEFAULT_LIFETIME_ALLOWANCE,
};

use crate::ledger_service::ContributionLedger;

/// Per-tax-year aggregate fed to the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlexibleIsaState {
    pub annual_allowance: Decimal,
    pub contributions_this_year: Decimal,
    pub withdrawals_this_year: Decimal,
}

impl FlexibleIsaState {
    pub fn new(
        annual_allowance: Decimal,
        contributions_this_year: Decimal,
        withdrawals_this_year: Decimal,
    ) -> Self {
        Self {
            annual_allowance,
            contributions_this_year,
            withdrawals_this_year,
        }
    }

    /// Builds the state for a deposit into `{provider, isa_type}` during `tax_year`.
    ///
    /// `contributions_this_year` is the allowance already consumed across every type.
    /// The replacement allowance belongs to the target account only and is zero unless
    /// that account is flexible.
    pub fn from_ledger(
        contributions: &[Contribution],
        withdrawals: &[Withdrawal],
        flexibility: &FlexibilitySettings,
        tax_year: TaxYear,
        provider: &str,
        isa_type: IsaType,
        annual_allowance: Decimal,
    ) -> Self {
        let position = AllowancePosition::replay(contributions, withdrawals, flexibility, tax_year);
        Self::new(
            annual_allowance,
            position.allowance_used,
            position.replacement_for(provider, isa_type),
        )
    }

    /// Raw unused allowance; negative when the year is already over-subscribed.
    pub fn unused_allowance(&self) -> Decimal {
        self.annual_allowance - self.contributions_this_year
    }

    pub fn replacement_allowance(&self) -> Decimal {
        self.withdrawals_this_year
    }

    pub fn total_capacity(&self) -> Decimal {
        self.unused_allowance().max(Decimal::ZERO) + self.replacement_allowance()
    }
}

/// Replacement allowance still open on one flexible account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReplacement {
    pub provider: String,
    pub isa_type: IsaType,
    pub withdrawn: Decimal,
    pub available: Decimal,
}

impl AccountReplacement {
    fn is_for(&self, provider: &str, isa_type: IsaType) -> bool {
        self.isa_type == isa_type && same_provider(&self.provider, provider)
    }
}

/// Where a tax year stands after replaying its events in date order.
///
/// A withdrawal from a flexible account opens replacement allowance on that account.
/// Later deposits into the same account use it up before touching the annual
/// allowance, so a redeposit never restores the same capacity twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowancePosition {
    pub tax_year: TaxYear,
    pub gross_contributed: Decimal,
    pub allowance_used: Decimal,
    pub replacement: Vec<AccountReplacement>,
}

enum YearEvent<'a> {
    Withdrawal(&'a Withdrawal),
    Contribution(&'a Contribution),
}

impl YearEvent<'_> {
    fn sort_key(&self) -> (chrono::NaiveDateTime, u8) {
        match self {
            YearEvent::Withdrawal(withdrawal) => (withdrawal.date, 0),
            YearEvent::Contribution(contribution) => (contribution.date, 1),
        }
    }
}

impl AllowancePosition {
    pub fn replay(
        contributions: &[Contribution],
        withdrawals: &[Withdrawal],
        flexibility: &FlexibilitySettings,
        tax_year: TaxYear,
    ) -> Self {
        let mut events: Vec<YearEvent<'_>> =
            ContributionLedger::filter_by_tax_year(contributions, &tax_year)
                .into_iter()
                .filter(|contribution| contribution.is_eligible())
                .map(YearEvent::Contribution)
                .chain(
                    withdrawals
                        .iter()
                        .filter(|withdrawal| tax_year.contains(withdrawal.date))
                        .filter(|withdrawal| {
                            flexibility.is_flexible(&withdrawal.provider, withdrawal.isa_type)
                        })
                        .map(YearEvent::Withdrawal),
                )
                .collect();
        events.sort_by_key(YearEvent::sort_key);

        let mut position = Self {
            tax_year,
            gross_contributed: Decimal::ZERO,
            allowance_used: Decimal::ZERO,
            replacement: Vec::new(),
        };
        for event in events {
            match event {
                YearEvent::Withdrawal(withdrawal) => {
                    let account = position.account_mut(&withdrawal.provider, withdrawal.isa_type);
                    account.withdrawn += withdrawal.amount;
                    account.available += withdrawal.amount;
                }
                YearEvent::Contribution(contribution) => {
                    position.gross_contributed += contribution.amount;
                    let replaced = position
                        .replacement
                        .iter_mut()
                        .find(|account| {
                            account.is_for(&contribution.provider, contribution.isa_type)
                        })
                        .map(|account| {
                            let replaced = contribution.amount.min(account.available);
                            account.available -= replaced;
                            replaced
                        })
                        .unwrap_or(Decimal::ZERO);
                    position.allowance_used += contribution.amount - replaced;
                }
            }
        }
        position
    }

    pub fn replacement_for(&self, provider: &str, isa_type: IsaType) -> Decimal {
        self.replacement
            .iter()
            .find(|account| account.is_for(provider, isa_type))
            .map(|account| account.available)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_replacement(&self) -> Decimal {
        self.replacement.iter().map(|account| account.available).sum()
    }

    /// Raw unused allowance; negative when backdated history overshoots it.
    pub fn unused(&self, annual_allowance: Decimal) -> Decimal {
        annual_allowance - self.allowance_used
    }

    fn account_mut(&mut self, provider: &str, isa_type: IsaType) -> &mut AccountReplacement {
        let index = match self
            .replacement
            .iter()
            .position(|account| account.is_for(provider, isa_type))
        {
            Some(index) => index,
            None => {
                self.replacement.push(AccountReplacement {
                    provider: provider.trim().to_string(),
                    isa_type,
                    withdrawn: Decimal::ZERO,
                    available: Decimal::ZERO,
                });
                self.replacement.len() - 1
            }
        };
        &mut self.replacement[index]
    }
}

/// Successful evaluation: how the deposit is split and what remains afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositAllocation {
    pub deposit: Decimal,
    pub raw_unused_allowance: Decimal,
    pub allocated_to_replacement: Decimal,
    pub allocated_to_unused: Decimal,
    pub contributions_this_year: Decimal,
    pub unused_allowance: Decimal,
    pub replacement_allowance: Decimal,
    pub total_remaining_capacity: Decimal,
}

/// Breakdown attached to a capacity rejection so the caller can explain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityShortfall {
    pub deposit: Decimal,
    pub shortfall: Decimal,
    pub unused_allowance: Decimal,
    pub replacement_allowance: Decimal,
    pub total_capacity: Decimal,
}

impl fmt::Display for CapacityShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deposit of £{} exceeds available capacity of £{} by £{} (unused £{}, replacement £{})",
            self.deposit,
            self.total_capacity,
            self.shortfall,
            self.unused_allowance,
            self.replacement_allowance
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositRejection {
    NonPositiveAmount(Decimal),
    CapacityExceeded(CapacityShortfall),
}

impl fmt::Display for DepositRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositRejection::NonPositiveAmount(_) => f.write_str("amount must be positive"),
            DepositRejection::CapacityExceeded(shortfall) => shortfall.fmt(f),
        }
    }
}

impl std::error::Error for DepositRejection {}

/// Checks whether `deposit` fits and allocates it replacement-first.
pub fn evaluate_deposit(
    state: &FlexibleIsaState,
    deposit: Decimal,
) -> Result<DepositAllocation, DepositRejection> {
    let raw_unused = state.unused_allowance();
    let unused = raw_unused.max(Decimal::ZERO);
    let replacement = state.replacement_allowance();
    let total_capacity = unused + replacement;

    if deposit <= Decimal::ZERO {
        return Err(DepositRejection::NonPositiveAmount(deposit));
    }
    if deposit > total_capacity {
        return Err(DepositRejection::CapacityExceeded(CapacityShortfall {
            deposit,
            shortfall: deposit - total_capacity,
            unused_allowance: raw_unused,
            replacement_allowance: replacement,
            total_capacity,
        }));
    }

    let allocated_to_replacement = deposit.min(replacement);
    let remaining = deposit - allocated_to_replacement;
    let allocated_to_unused = remaining.min(unused);

    let unused_after = unused - allocated_to_unused;
    let replacement_after = replacement - allocated_to_replacement;
    Ok(DepositAllocation {
        deposit,
        raw_unused_allowance: raw_unused,
        allocated_to_replacement,
        allocated_to_unused,
        contributions_this_year: state.contributions_this_year + deposit,
        unused_allowance: unused_after,
        replacement_allowance: replacement_after,
        total_remaining_capacity: unused_after + replacement_after,
    })
}

/// Configured yearly caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllowanceLimits {
    pub annual: Decimal,
    pub lifetime: Decimal,
}

impl Default for AllowanceLimits {
    fn default() -> Self {
        Self {
            annual: DEFAULT_ANNUAL_ALLOWANCE,
            lifetime: DEFAULT_LIFETIME_ALLOWANCE,
        }
    }
}

/// Remaining Lifetime ISA headroom in `tax_year`, never below zero.
pub fn lifetime_headroom(
    contributions: &[Contribution],
    tax_year: &TaxYear,
    limits: &AllowanceLimits,
) -> Decimal {
    let paid_in = sum_amounts(
        ContributionLedger::filter_by_tax_year(contributions, tax_year)
            .into_iter()
            .filter(|contribution| {
                contribution.is_eligible() && contribution.isa_type == IsaType::Lifetime
            }),
    );
    (limits.lifetime - paid_in).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(contributed: Decimal, withdrawn: Decimal) -> FlexibleIsaState {
        FlexibleIsaState::new(dec!(20000), contributed, withdrawn)
    }

    #[test]
    fn replacement_is_consumed_before_fresh_allowance() {
        let allocation = evaluate_deposit(&state(dec!(18000), dec!(2000)), dec!(3000)).unwrap();
        assert_eq!(allocation.allocated_to_replacement, dec!(2000));
        assert_eq!(allocation.allocated_to_unused, dec!(1000));
        assert_eq!(allocation.contributions_this_year, dec!(21000));
        assert_eq!(allocation.replacement_allowance, dec!(0));
        assert_eq!(allocation.unused_allowance, dec!(1000));
        assert_eq!(allocation.total_remaining_capacity, dec!(1000));
    }

    #[test]
    fn filling_capacity_exactly_leaves_nothing() {
        let allocation = evaluate_deposit(&state(dec!(18000), dec!(2000)), dec!(4000)).unwrap();
        assert_eq!(allocation.total_remaining_capacity, dec!(0));
        assert_eq!(
            evaluate_deposit(&state(dec!(18000), dec!(2000)), dec!(2001))
                .unwrap()
                .allocated_to_unused,
            dec!(1)
        );
    }

    #[test]
    fn over_capacity_reports_shortfall_and_breakdown() {
        let err = evaluate_deposit(&state(dec!(18000), dec!(2000)), dec!(4001)).unwrap_err();
        assert_eq!(
            err,
            DepositRejection::CapacityExceeded(CapacityShortfall {
                deposit: dec!(4001),
                shortfall: dec!(1),
                unused_allowance: dec!(2000),
                replacement_allowance: dec!(2000),
                total_capacity: dec!(4000),
            })
        );
    }

    #[test]
    fn non_positive_deposits_are_rejected() {
        assert_eq!(
            evaluate_deposit(&state(dec!(0), dec!(0)), dec!(0)).unwrap_err(),
            DepositRejection::NonPositiveAmount(dec!(0))
        );
        assert!(matches!(
            evaluate_deposit(&state(dec!(0), dec!(0)), dec!(-1)),
            Err(DepositRejection::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn over_subscribed_year_keeps_raw_unused_but_offers_only_replacement() {
        let over = state(dec!(21000), dec!(500));
        assert_eq!(over.unused_allowance(), dec!(-1000));
        assert_eq!(over.total_capacity(), dec!(500));
        let allocation = evaluate_deposit(&over, dec!(500)).unwrap();
        assert_eq!(allocation.raw_unused_allowance, dec!(-1000));
        assert_eq!(allocation.allocated_to_unused, dec!(0));
        assert_eq!(allocation.total_remaining_capacity, dec!(0));
        assert!(evaluate_deposit(&over, dec!(501)).is_err());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let snapshot = state(dec!(5000), dec!(100));
        let first = evaluate_deposit(&snapshot, dec!(250.50));
        let second = evaluate_deposit(&snapshot, dec!(250.50));
        assert_eq!(first, second);
        assert_eq!(snapshot, state(dec!(5000), dec!(100)));
    }

    fn at(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn flexible_chip() -> FlexibilitySettings {
        let mut settings = FlexibilitySettings::new();
        settings.set(isa_domain::FlexibilityPolicy::new("Chip", IsaType::Cash, true).unwrap());
        settings
    }

    #[test]
    fn redeposit_consumes_replacement_only_once() {
        let year = TaxYear::new(2024);
        let contributions = vec![
            Contribution::new(IsaType::Cash, "Chip", dec!(18000), at(2024, 5, 1)).unwrap(),
            Contribution::new(IsaType::Cash, "Chip", dec!(1500), at(2024, 8, 1)).unwrap(),
        ];
        let withdrawals =
            vec![Withdrawal::new(IsaType::Cash, "Chip", dec!(2000), at(2024, 7, 1)).unwrap()];
        let position =
            AllowancePosition::replay(&contributions, &withdrawals, &flexible_chip(), year);
        assert_eq!(position.gross_contributed, dec!(19500));
        assert_eq!(position.allowance_used, dec!(18000));
        assert_eq!(position.replacement_for("chip", IsaType::Cash), dec!(500));

        let state = FlexibleIsaState::from_ledger(
            &contributions,
            &withdrawals,
            &flexible_chip(),
            year,
            "Chip",
            IsaType::Cash,
            dec!(20000),
        );
        assert_eq!(state.total_capacity(), dec!(2500));
    }

    #[test]
    fn replacement_is_tied_to_a_flexible_account() {
        let year = TaxYear::new(2024);
        let contributions =
            vec![Contribution::new(IsaType::Cash, "Chip", dec!(18000), at(2024, 5, 1)).unwrap()];
        let withdrawals =
            vec![Withdrawal::new(IsaType::Cash, "Chip", dec!(2000), at(2024, 7, 1)).unwrap()];

        let other_account = FlexibleIsaState::from_ledger(
            &contributions,
            &withdrawals,
            &flexible_chip(),
            year,
            "Marcus",
            IsaType::Cash,
            dec!(20000),
        );
        assert_eq!(other_account.replacement_allowance(), dec!(0));

        let rigid = FlexibleIsaState::from_ledger(
            &contributions,
            &withdrawals,
            &FlexibilitySettings::new(),
            year,
            "Chip",
            IsaType::Cash,
            dec!(20000),
        );
        assert_eq!(rigid.replacement_allowance(), dec!(0));
        assert_eq!(rigid.total_capacity(), dec!(2000));
    }

    #[test]
    fn lifetime_headroom_counts_only_eligible_lifetime_entries() {
        let year = TaxYear::new(2024);
        let mut deleted =
            Contribution::new(IsaType::Lifetime, "Moneybox", dec!(1000), at(2024, 6, 1)).unwrap();
        deleted.deleted = true;
        let contributions = vec![
            Contribution::new(IsaType::Lifetime, "Moneybox", dec!(3000), at(2024, 5, 1)).unwrap(),
            Contribution::new(IsaType::Cash, "Chip", dec!(9000), at(2024, 5, 1)).unwrap(),
            deleted,
        ];
        assert_eq!(
            lifetime_headroom(&contributions, &year, &AllowanceLimits::default()),
            dec!(1000)
        );
    }
}
