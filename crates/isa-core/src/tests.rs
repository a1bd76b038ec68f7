use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal_macros::dec;

use crate::{
    book::IsaBook,
    calendar::available_tax_years,
    public_api::{
        api_audit, api_check_deposit, api_record_contribution, api_record_withdrawal,
        api_score, api_set_flexibility, api_soft_delete, api_tax_year_summary,
    },
    storage::{ContributionStore, FlexibilityStore, WithdrawalStore},
    AddContributionWizard, AllowanceLimits, ConsistencyScoringEngine, CoreError, TaxYearCalendar,
    FixedClock,
};
use isa_domain::{
    Contribution, FlexibilityPolicy, FlexibilitySettings, IsaType, PolicyViolation, TaxYear,
    Withdrawal,
};

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

#[derive(Default)]
struct MemoryStore {
    contributions: Mutex<Vec<Contribution>>,
    withdrawals: Mutex<Vec<Withdrawal>>,
    flexibility: Mutex<FlexibilitySettings>,
    writes: Mutex<Vec<&'static str>>,
    fail_on: Option<&'static str>,
}

impl MemoryStore {
    fn write(&self, document: &'static str) -> Result<(), CoreError> {
        if self.fail_on == Some(document) {
            return Err(CoreError::Storage(format!("{document}: disk full")));
        }
        self.writes.lock().unwrap().push(document);
        Ok(())
    }
}

impl ContributionStore for MemoryStore {
    fn load_contributions(&self) -> Result<Vec<Contribution>, CoreError> {
        Ok(self.contributions.lock().unwrap().clone())
    }

    fn save_contributions(&self, contributions: &[Contribution]) -> Result<(), CoreError> {
        self.write("contributions")?;
        *self.contributions.lock().unwrap() = contributions.to_vec();
        Ok(())
    }
}

impl WithdrawalStore for MemoryStore {
    fn load_withdrawals(&self) -> Result<Vec<Withdrawal>, CoreError> {
        Ok(self.withdrawals.lock().unwrap().clone())
    }

    fn save_withdrawals(&self, withdrawals: &[Withdrawal]) -> Result<(), CoreError> {
        self.write("withdrawals")?;
        *self.withdrawals.lock().unwrap() = withdrawals.to_vec();
        Ok(())
    }
}

impl FlexibilityStore for MemoryStore {
    fn load_flexibility(&self) -> Result<FlexibilitySettings, CoreError> {
        Ok(self.flexibility.lock().unwrap().clone())
    }

    fn save_flexibility(&self, settings: &FlexibilitySettings) -> Result<(), CoreError> {
        self.write("flexibility")?;
        *self.flexibility.lock().unwrap() = settings.clone();
        Ok(())
    }
}

fn contribution(
    kind: IsaType,
    provider: &str,
    amount: rust_decimal::Decimal,
    date: NaiveDateTime,
) -> Contribution {
    Contribution::new(kind, provider, amount, date).expect("valid contribution")
}

#[test]
fn book_round_trips_through_a_store() {
    let store = MemoryStore::default();
    let mut book = IsaBook::new();
    api_set_flexibility(&mut book, "Chip", IsaType::Cash, true).expect("set policy");
    api_record_contribution(
        &mut book,
        &AllowanceLimits::default(),
        contribution(IsaType::Cash, "Chip", dec!(500), at(2024, 5, 1)),
        None,
    )
    .expect("record");
    book.save(&store).expect("save");

    let reloaded = IsaBook::load(&store).expect("load");
    assert_eq!(reloaded, book);
    assert!(reloaded.warnings().is_empty());
}

#[test]
fn flexible_withdrawal_opens_replacement_capacity() {
    let limits = AllowanceLimits::default();
    let mut book = IsaBook::new();
    api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Cash, "Chip", dec!(18000), at(2024, 5, 1)),
        Some(FlexibilityPolicy::new("Chip", IsaType::Cash, true).unwrap()),
    )
    .expect("first deposit");
    api_record_withdrawal(
        &mut book,
        Withdrawal::new(IsaType::Cash, "Chip", dec!(2000), at(2024, 6, 1)).unwrap(),
    )
    .expect("withdraw");

    let allocation =
        api_check_deposit(&book, &limits, "Chip", IsaType::Cash, dec!(3000), at(2024, 7, 1))
            .expect("fits");
    assert_eq!(allocation.allocated_to_replacement, dec!(2000));
    assert_eq!(allocation.allocated_to_unused, dec!(1000));

    let err =
        api_check_deposit(&book, &limits, "Chip", IsaType::Cash, dec!(4001), at(2024, 7, 1))
            .unwrap_err();
    match err {
        CoreError::CapacityExceeded(shortfall) => assert_eq!(shortfall.shortfall, dec!(1)),
        other => panic!("unexpected error: {other}"),
    }

    let elsewhere = api_check_deposit(
        &book,
        &limits,
        "Vanguard",
        IsaType::StocksAndShares,
        dec!(2001),
        at(2024, 7, 1),
    );
    assert!(matches!(elsewhere, Err(CoreError::CapacityExceeded(_))));
}

#[test]
fn rejected_deposit_does_not_store_its_policy() {
    let limits = AllowanceLimits::default();
    let mut book = IsaBook::new();
    let err = api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Cash, "Chip", dec!(20001), at(2024, 5, 1)),
        Some(FlexibilityPolicy::new("Chip", IsaType::Cash, true).unwrap()),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::CapacityExceeded(_)));
    assert!(book.contributions.is_empty());
    assert!(book.flexibility.policies().is_empty());
}

#[test]
fn lifetime_rules_are_enforced_on_record() {
    let limits = AllowanceLimits::default();
    let mut book = IsaBook::new();
    api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Lifetime, "Moneybox", dec!(3500), at(2024, 5, 1)),
        None,
    )
    .expect("first lifetime deposit");

    let second_provider = api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Lifetime, "AJ Bell", dec!(100), at(2024, 6, 1)),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        second_provider,
        CoreError::Policy(PolicyViolation::SecondLifetimeProvider { .. })
    ));

    let over_cap = api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Lifetime, "Moneybox", dec!(501), at(2024, 6, 1)),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        over_cap,
        CoreError::Policy(PolicyViolation::LifetimeCapExceeded { .. })
    ));

    let next_year = api_record_contribution(
        &mut book,
        &limits,
        contribution(IsaType::Lifetime, "Moneybox", dec!(4000), at(2025, 4, 6)),
        None,
    );
    assert!(next_year.is_ok());
}

#[test]
fn withdrawals_cannot_exceed_recorded_balance() {
    let mut book = IsaBook::new();
    book.contributions
        .push(contribution(IsaType::Cash, "Marcus", dec!(100), at(2024, 5, 1)));
    let err = api_record_withdrawal(
        &mut book,
        Withdrawal::new(IsaType::Cash, "Marcus", dec!(100.01), at(2024, 6, 1)).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation(_)));
    assert!(api_record_withdrawal(
        &mut book,
        Withdrawal::new(IsaType::Cash, "marcus", dec!(100), at(2024, 6, 1)).unwrap(),
    )
    .is_ok());
}

#[test]
fn summary_reports_breakdown_and_headroom() {
    let limits = AllowanceLimits::default();
    let mut book = IsaBook::new();
    for (kind, provider, amount) in [
        (IsaType::StocksAndShares, "Vanguard", dec!(5000)),
        (IsaType::Cash, "Marcus", dec!(1000)),
        (IsaType::Lifetime, "Moneybox", dec!(1000)),
    ] {
        let entry = contribution(kind, provider, amount, at(2024, 5, 1));
        api_record_contribution(&mut book, &limits, entry, None).expect("record");
    }
    let summary = api_tax_year_summary(&book, &limits, TaxYear::new(2024));
    assert_eq!(summary.gross_contributed, dec!(7000));
    assert_eq!(summary.unused_allowance, dec!(13000));
    assert_eq!(summary.new_allowance_left, dec!(13000));
    assert_eq!(summary.lifetime_headroom, dec!(3000));
    assert_eq!(summary.breakdown.len(), 3);
    assert_eq!(summary.replacement_allowance, dec!(0));
}

#[test]
fn backdated_overshoot_is_audited_not_rejected() {
    let limits = AllowanceLimits::default();
    let mut book = IsaBook::new();
    book.contributions.extend([
        contribution(IsaType::Cash, "Marcus", dec!(15000), at(2021, 5, 1)),
        contribution(IsaType::StocksAndShares, "Vanguard", dec!(7000), at(2021, 9, 1)),
    ]);
    let breaches = api_audit(&book, &limits);
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].excess, dec!(2000));

    let summary = api_tax_year_summary(&book, &limits, TaxYear::new(2021));
    assert_eq!(summary.unused_allowance, dec!(-2000));
    assert_eq!(summary.new_allowance_left, dec!(0));
}

#[test]
fn soft_delete_removes_entry_from_score() {
    let mut book = IsaBook::new();
    let limits = AllowanceLimits::default();
    let mut ids = Vec::new();
    for month in [4, 5, 6] {
        let (id, _) = api_record_contribution(
            &mut book,
            &limits,
            contribution(IsaType::Cash, "Marcus", dec!(50), at(2024, month, 10)),
            None,
        )
        .unwrap();
        ids.push(id);
    }
    let engine = ConsistencyScoringEngine::standard();
    assert_eq!(api_score(&book, &engine, TaxYear::new(2024)).score, 45);

    api_soft_delete(&mut book, ids[1]).unwrap();
    let after = api_score(&book, &engine, TaxYear::new(2024));
    assert_eq!(after.months_covered, 2);
    assert_eq!(after.score, 27);
    assert_eq!(book.contributions.len(), 3);
}

#[test]
fn wizard_outcome_feeds_record_contribution() {
    let clock = FixedClock(at(2024, 10, 1));
    let calendar = TaxYearCalendar::with_clock(clock);
    let mut book = IsaBook::new();
    let mut wizard =
        AddContributionWizard::new(calendar.now(), &book.flexibility, &book.contributions);
    wizard.choose_provider("Trading 212").unwrap();
    wizard.choose_type(IsaType::StocksAndShares).unwrap();
    wizard.enter_amount_text("2,500").unwrap();
    wizard.confirm_flexibility(true).unwrap();
    let outcome = wizard.finish().unwrap();

    let limits = AllowanceLimits::default();
    api_record_contribution(&mut book, &limits, outcome.contribution, outcome.policy)
        .expect("record");
    assert_eq!(
        book.flexibility.get("trading 212", IsaType::StocksAndShares),
        Some(true)
    );
    assert_eq!(book.contributions[0].tax_year(), calendar.current());
}

#[test]
fn available_years_are_newest_first() {
    let years = available_tax_years(at(2024, 4, 5), 2, 1);
    let labels: Vec<_> = years.iter().map(TaxYear::label).collect();
    assert_eq!(labels, vec!["24/25", "23/24", "22/23", "21/22"]);
}

#[test]
fn contributions_are_written_last() {
    let store = MemoryStore::default();
    let mut book = IsaBook::new();
    book.contributions
        .push(contribution(IsaType::Cash, "Chip", dec!(100), at(2024, 5, 1)));
    book.save(&store).expect("save");
    assert_eq!(
        *store.writes.lock().unwrap(),
        vec!["flexibility", "withdrawals", "contributions"]
    );

    let failing = MemoryStore {
        fail_on: Some("withdrawals"),
        ..MemoryStore::default()
    };
    assert!(matches!(book.save(&failing), Err(CoreError::Storage(_))));
    assert!(failing.contributions.lock().unwrap().is_empty());
}
