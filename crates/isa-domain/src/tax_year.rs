//! UK tax years (6 April to 5 April) as value objects.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

const FIRST_MONTH: u32 = 4;
const FIRST_DAY: u32 = 6;

/// Number of month slots in a tax year heat map.
pub const MONTHS_PER_TAX_YEAR: usize = 12;

/// A UK tax year identified by the calendar year in which it starts.
///
/// `2023` is the 2023/24 tax year: 6 April 2023 00:00:00.000 through
/// 5 April 2024 23:59:59.999, both ends inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxYear {
    pub start_year: i32,
}

impl TaxYear {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Returns the tax year that contains `date`.
    pub fn containing(date: NaiveDateTime) -> Self {
        let boundary = (date.month(), date.day());
        if boundary >= (FIRST_MONTH, FIRST_DAY) {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    /// 6 April of `start_year` at midnight.
    pub fn start(&self) -> NaiveDateTime {
        april(self.start_year, FIRST_DAY).and_time(NaiveTime::MIN)
    }

    /// 5 April of the following year at 23:59:59.999.
    pub fn end(&self) -> NaiveDateTime {
        self.next().start() - Duration::milliseconds(1)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start().date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end().date()
    }

    /// Inclusive-start, inclusive-end membership test.
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        date >= self.start() && date <= self.end()
    }

    pub fn previous(&self) -> Self {
        Self::new(self.start_year - 1)
    }

    pub fn next(&self) -> Self {
        Self::new(self.start_year + 1)
    }

    /// Two-digit form, e.g. `23/24`.
    pub fn label(&self) -> String {
        format!(
            "{:02}/{:02}",
            self.start_year.rem_euclid(100),
            (self.start_year + 1).rem_euclid(100)
        )
    }

    /// Four-digit start form, e.g. `2023/24`.
    pub fn long_label(&self) -> String {
        format!(
            "{}/{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }

    /// Heat-map slot for `date`: April is 0, March is 11.
    ///
    /// The 1 to 5 April tail of the closing year shares slot 11 with March.
    /// Returns `None` when `date` falls outside this tax year.
    pub fn month_offset(&self, date: NaiveDateTime) -> Option<usize> {
        if !self.contains(date) {
            return None;
        }
        let elapsed = (date.year() - self.start_year) * 12 + date.month() as i32
            - FIRST_MONTH as i32;
        Some(elapsed.clamp(0, MONTHS_PER_TAX_YEAR as i32 - 1) as usize)
    }

    /// Three-letter month names in heat-map order.
    pub fn month_labels() -> [&'static str; MONTHS_PER_TAX_YEAR] {
        [
            "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar",
        ]
    }
}

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.long_label())
    }
}

/// Years outside chrono's range saturate to its calendar limits.
fn april(year: i32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, FIRST_MONTH, day).unwrap_or(if year < 0 {
        NaiveDate::MIN
    } else {
        NaiveDate::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_milli_opt(h, min, s, ms)
            .unwrap()
    }

    #[test]
    fn boundaries_straddle_the_year_split() {
        let last_moment = at(2024, 4, 5, 23, 59, 59, 999);
        let first_moment = at(2024, 4, 6, 0, 0, 0, 0);
        assert_eq!(TaxYear::containing(last_moment), TaxYear::new(2023));
        assert_eq!(TaxYear::containing(first_moment), TaxYear::new(2024));
        assert_eq!(TaxYear::new(2023).end(), last_moment);
        assert_eq!(TaxYear::new(2024).start(), first_moment);
    }

    #[test]
    fn leap_years_do_not_move_the_fifth_of_april() {
        let year = TaxYear::new(2023);
        assert_eq!(year.end_date(), NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());
        assert!(year.contains(at(2024, 2, 29, 12, 0, 0, 0)));
    }

    #[test]
    fn labels_use_two_digit_years() {
        assert_eq!(TaxYear::new(2023).label(), "23/24");
        assert_eq!(TaxYear::new(1999).label(), "99/00");
        assert_eq!(TaxYear::new(2023).long_label(), "2023/24");
        assert_eq!(TaxYear::new(2023).to_string(), "2023/24");
    }

    #[test]
    fn month_offsets_follow_the_tax_calendar() {
        let year = TaxYear::new(2024);
        assert_eq!(year.month_offset(at(2024, 4, 6, 0, 0, 0, 0)), Some(0));
        assert_eq!(year.month_offset(at(2024, 6, 30, 9, 0, 0, 0)), Some(2));
        assert_eq!(year.month_offset(at(2025, 1, 15, 9, 0, 0, 0)), Some(9));
        assert_eq!(year.month_offset(at(2025, 3, 31, 9, 0, 0, 0)), Some(11));
        assert_eq!(year.month_offset(at(2025, 4, 5, 9, 0, 0, 0)), Some(11));
        assert_eq!(year.month_offset(at(2025, 4, 6, 0, 0, 0, 0)), None);
        assert_eq!(year.month_offset(at(2024, 4, 5, 23, 0, 0, 0)), None);
    }
}
