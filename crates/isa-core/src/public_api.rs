//! Stable, public-facing helpers that wrap the internal service layer.
//!
//! Front ends (the shell today) call these instead of stitching the ledger,
//! calculator and policy table together themselves. Every function takes the
//! [`IsaBook`] snapshot explicitly; none of them touches storage.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use isa_domain::{
    Contribution, FlexibilityPolicy, FlexibilitySettings, IsaType, PolicyViolation, TaxYear,
    Withdrawal,
};

use crate::{
    allowance::{
        evaluate_deposit, lifetime_headroom, AllowanceLimits, AllowancePosition,
        DepositAllocation, FlexibleIsaState,
    },
    book::IsaBook,
    flexibility_service::FlexibilityService,
    ledger_service::{AllowanceBreach, ContributionLedger, TypeBreakdown},
    scoring::{ConsistencyScore, ConsistencyScoringEngine},
    CoreError,
};

/// Allowance picture for one tax year.
#[derive(Debug, Clone, Serialize)]
pub struct ApiTaxYearSummary {
    pub tax_year: TaxYear,
    pub annual_allowance: Decimal,
    pub gross_contributed: Decimal,
    pub allowance_used: Decimal,
    /// Raw; negative when backdated history overshoots the allowance.
    pub unused_allowance: Decimal,
    /// Fresh allowance any account can still take: `unused_allowance` floored at zero.
    pub new_allowance_left: Decimal,
    /// Sum over accounts; each share is only usable on its own account (see `position`).
    pub replacement_allowance: Decimal,
    pub lifetime_headroom: Decimal,
    pub breakdown: TypeBreakdown,
    pub position: AllowancePosition,
}

/// Checks a prospective deposit without changing the book.
///
/// Lifetime deposits must also respect the single-provider rule and the Lifetime cap.
pub fn api_check_deposit(
    book: &IsaBook,
    limits: &AllowanceLimits,
    provider: &str,
    isa_type: IsaType,
    amount: Decimal,
    date: NaiveDateTime,
) -> Result<DepositAllocation, CoreError> {
    let target = Target {
        provider,
        isa_type,
        amount,
        tax_year: TaxYear::containing(date),
    };
    check_deposit(book, &book.flexibility, limits, &target)
}

/// Validates and appends a contribution, storing `policy` only when the deposit is accepted.
pub fn api_record_contribution(
    book: &mut IsaBook,
    limits: &AllowanceLimits,
    contribution: Contribution,
    policy: Option<FlexibilityPolicy>,
) -> Result<(Uuid, DepositAllocation), CoreError> {
    let mut flexibility = book.flexibility.clone();
    if let Some(policy) = policy {
        flexibility.set(policy);
    }
    let target = Target {
        provider: &contribution.provider,
        isa_type: contribution.isa_type,
        amount: contribution.amount,
        tax_year: contribution.tax_year(),
    };
    let allocation = check_deposit(book, &flexibility, limits, &target)?;
    book.flexibility = flexibility;
    let id = ContributionLedger::record(&mut book.contributions, contribution);
    tracing::info!(
        %id,
        allocated_to_replacement = %allocation.allocated_to_replacement,
        allocated_to_unused = %allocation.allocated_to_unused,
        "contribution recorded"
    );
    Ok((id, allocation))
}

/// Appends a withdrawal. It cannot exceed what the account holds from recorded contributions.
pub fn api_record_withdrawal(
    book: &mut IsaBook,
    withdrawal: Withdrawal,
) -> Result<Uuid, CoreError> {
    let paid_in = ContributionLedger::total_contributed(
        book.contributions
            .iter()
            .filter(|c| c.isa_type == withdrawal.isa_type && c.is_with(&withdrawal.provider)),
    );
    let taken_out = ContributionLedger::total_withdrawn(
        book.withdrawals
            .iter()
            .filter(|w| w.is_from(&withdrawal.provider, withdrawal.isa_type)),
    );
    let balance = paid_in - taken_out;
    if withdrawal.amount > balance {
        return Err(CoreError::InvalidOperation(format!(
            "withdrawal of £{} exceeds the £{} recorded in {} {}",
            withdrawal.amount, balance, withdrawal.provider, withdrawal.isa_type
        )));
    }
    if !book
        .flexibility
        .is_flexible(&withdrawal.provider, withdrawal.isa_type)
    {
        tracing::info!(
            provider = %withdrawal.provider,
            isa_type = withdrawal.isa_type.key(),
            "withdrawal from a non-flexible account does not restore allowance"
        );
    }
    let id = withdrawal.id;
    book.withdrawals.push(withdrawal);
    Ok(id)
}

pub fn api_tax_year_summary(
    book: &IsaBook,
    limits: &AllowanceLimits,
    tax_year: TaxYear,
) -> ApiTaxYearSummary {
    let in_year = book.contributions_in(&tax_year);
    let breakdown = ContributionLedger::group_by_type_and_provider(in_year);
    let position = AllowancePosition::replay(
        &book.contributions,
        &book.withdrawals,
        &book.flexibility,
        tax_year,
    );
    let unused_allowance = position.unused(limits.annual);
    ApiTaxYearSummary {
        tax_year,
        annual_allowance: limits.annual,
        gross_contributed: position.gross_contributed,
        allowance_used: position.allowance_used,
        unused_allowance,
        new_allowance_left: unused_allowance.max(Decimal::ZERO),
        replacement_allowance: position.total_replacement(),
        lifetime_headroom: lifetime_headroom(&book.contributions, &tax_year, limits),
        breakdown,
        position,
    }
}

pub fn api_score(
    book: &IsaBook,
    engine: &ConsistencyScoringEngine,
    tax_year: TaxYear,
) -> ConsistencyScore {
    engine.score(tax_year, &book.contributions)
}

/// Years whose allowance use exceeds the annual limit once flexible replacements are netted off.
pub fn api_audit(book: &IsaBook, limits: &AllowanceLimits) -> Vec<AllowanceBreach> {
    ContributionLedger::allowance_breaches(&book.contributions, limits.annual)
        .into_iter()
        .filter_map(|gross| {
            let position = AllowancePosition::replay(
                &book.contributions,
                &book.withdrawals,
                &book.flexibility,
                gross.tax_year,
            );
            if position.allowance_used > limits.annual {
                Some(AllowanceBreach {
                    contributed: position.allowance_used,
                    excess: position.allowance_used - limits.annual,
                    ..gross
                })
            } else {
                tracing::debug!(
                    tax_year = %gross.tax_year,
                    "gross excess covered by flexible replacement"
                );
                None
            }
        })
        .collect()
}

pub fn api_soft_delete(book: &mut IsaBook, id: Uuid) -> Result<(), CoreError> {
    ContributionLedger::soft_delete(&mut book.contributions, id)?;
    tracing::info!(%id, "contribution deleted");
    Ok(())
}

pub fn api_mark_withdrawn(book: &mut IsaBook, id: Uuid) -> Result<(), CoreError> {
    ContributionLedger::mark_withdrawn(&mut book.contributions, id)
}

pub fn api_restore(book: &mut IsaBook, id: Uuid) -> Result<(), CoreError> {
    ContributionLedger::restore(&mut book.contributions, id)
}

pub fn api_set_flexibility(
    book: &mut IsaBook,
    provider: &str,
    isa_type: IsaType,
    flexible: bool,
) -> Result<(), CoreError> {
    FlexibilityService::set(&mut book.flexibility, provider, isa_type, flexible)
}

struct Target<'a> {
    provider: &'a str,
    isa_type: IsaType,
    amount: Decimal,
    tax_year: TaxYear,
}

fn check_deposit(
    book: &IsaBook,
    flexibility: &FlexibilitySettings,
    limits: &AllowanceLimits,
    target: &Target<'_>,
) -> Result<DepositAllocation, CoreError> {
    if target.isa_type == IsaType::Lifetime {
        ContributionLedger::lifetime_provider_conflict(&book.contributions, target.provider)?;
        let remaining = lifetime_headroom(&book.contributions, &target.tax_year, limits);
        if target.amount > remaining {
            return Err(PolicyViolation::LifetimeCapExceeded {
                remaining,
                requested: target.amount,
            }
            .into());
        }
    }
    let state = FlexibleIsaState::from_ledger(
        &book.contributions,
        &book.withdrawals,
        flexibility,
        target.tax_year,
        target.provider,
        target.isa_type,
        limits.annual,
    );
    Ok(evaluate_deposit(&state, target.amount)?)
}
