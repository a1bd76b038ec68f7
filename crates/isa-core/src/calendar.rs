//! Tax-year classification and enumeration.

use chrono::NaiveDateTime;

use isa_domain::TaxYear;

use crate::time::{Clock, SystemClock};

/// Returns the tax year containing `now`.
pub fn current_tax_year(now: NaiveDateTime) -> TaxYear {
    TaxYear::containing(now)
}

/// Builds the tax year that starts on 6 April of `start_year`.
pub fn tax_year_boundaries(start_year: i32) -> TaxYear {
    TaxYear::new(start_year)
}

/// Classifies an arbitrary date; agrees with [`current_tax_year`] at the boundaries.
pub fn tax_year_of(date: NaiveDateTime) -> TaxYear {
    TaxYear::containing(date)
}

pub fn is_in_tax_year(date: NaiveDateTime, tax_year: &TaxYear) -> bool {
    tax_year.contains(date)
}

/// Enumerates `past_count` years before the current one through `future_count`
/// years after it, newest first.
pub fn available_tax_years(
    now: NaiveDateTime,
    past_count: u32,
    future_count: u32,
) -> Vec<TaxYear> {
    let current = current_tax_year(now).start_year;
    let newest = current + future_count as i32;
    let oldest = current - past_count as i32;
    (oldest..=newest).rev().map(TaxYear::new).collect()
}

/// Two-digit label, e.g. `23/24`.
pub fn label(tax_year: &TaxYear) -> String {
    tax_year.label()
}

/// Binds the pure calendar functions to a [`Clock`].
#[derive(Debug, Clone)]
pub struct TaxYearCalendar<C: Clock = SystemClock> {
    clock: C,
}

impl TaxYearCalendar<SystemClock> {
    pub fn system() -> Self {
        Self { clock: SystemClock }
    }
}

impl Default for TaxYearCalendar<SystemClock> {
    fn default() -> Self {
        Self::system()
    }
}

impl<C: Clock> TaxYearCalendar<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn current(&self) -> TaxYear {
        current_tax_year(self.clock.now())
    }

    pub fn available(&self, past_count: u32, future_count: u32) -> Vec<TaxYear> {
        available_tax_years(self.clock.now(), past_count, future_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn current_tax_year_switches_on_sixth_of_april() {
        assert_eq!(current_tax_year(at(2025, 4, 5)).start_year, 2024);
        assert_eq!(current_tax_year(at(2025, 4, 6)).start_year, 2025);
        assert_eq!(current_tax_year(at(2025, 1, 1)).start_year, 2024);
        assert_eq!(current_tax_year(at(2025, 12, 31)).start_year, 2025);
    }

    #[test]
    fn tax_year_of_inverts_boundaries() {
        for start_year in 1990..2060 {
            let year = tax_year_boundaries(start_year);
            assert_eq!(tax_year_of(year.start()), year);
            assert_eq!(tax_year_of(year.end()), year);
            assert!(is_in_tax_year(year.end(), &year));
            assert!(!is_in_tax_year(year.next().start(), &year));
        }
    }

    #[test]
    fn available_years_are_newest_first() {
        let years = available_tax_years(at(2025, 10, 1), 2, 1);
        let labels: Vec<_> = years.iter().map(label).collect();
        assert_eq!(labels, vec!["26/27", "25/26", "24/25", "23/24"]);
    }

    #[test]
    fn available_years_without_history_is_just_current() {
        let years = available_tax_years(at(2025, 3, 1), 0, 0);
        assert_eq!(years, vec![TaxYear::new(2024)]);
    }

    #[test]
    fn calendar_uses_its_clock() {
        let calendar = TaxYearCalendar::with_clock(FixedClock(at(2024, 4, 6)));
        assert_eq!(calendar.current(), TaxYear::new(2024));
        assert_eq!(calendar.available(1, 0).len(), 2);
    }
}
