//! Consistency scoring: how regularly a tax year was funded, mapped onto level tiers.

use std::fmt;

use serde::Serialize;

use isa_domain::{Contribution, Level, LevelTable, TaxYear, MAX_SCORE, MONTHS_PER_TAX_YEAR};

const EARLY_BIRD_LAST_OFFSET: usize = 2;
const STREAK_LENGTH: usize = 3;
const FREQUENT_SAVER_MONTHS: usize = 6;

/// Fixed-value bonuses layered on top of the base score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bonus {
    EarlyBird,
    ActiveStreak,
    FrequentSaver,
}

impl Bonus {
    pub const ALL: [Bonus; 3] = [Bonus::EarlyBird, Bonus::ActiveStreak, Bonus::FrequentSaver];

    pub fn points(self) -> u8 {
        match self {
            Bonus::EarlyBird => 10,
            Bonus::ActiveStreak => 10,
            Bonus::FrequentSaver => 5,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Bonus::EarlyBird => "first contribution between April and June",
            Bonus::ActiveStreak => "three or more consecutive months funded",
            Bonus::FrequentSaver => "six or more months funded",
        }
    }

    fn earned(self, heat_map: &HeatMap) -> bool {
        match self {
            Bonus::EarlyBird => heat_map
                .first_active()
                .is_some_and(|offset| offset <= EARLY_BIRD_LAST_OFFSET),
            Bonus::ActiveStreak => heat_map.longest_streak() >= STREAK_LENGTH,
            Bonus::FrequentSaver => heat_map.months_covered() >= FREQUENT_SAVER_MONTHS,
        }
    }
}

impl fmt::Display for Bonus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bonus::EarlyBird => "Early Bird",
            Bonus::ActiveStreak => "Active Streak",
            Bonus::FrequentSaver => "Frequent Saver",
        };
        write!(f, "{name} (+{})", self.points())
    }
}

/// Twelve month slots, April first. A slot is set when any eligible contribution landed in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeatMap([bool; MONTHS_PER_TAX_YEAR]);

impl HeatMap {
    pub fn build<'a, I>(tax_year: &TaxYear, contributions: I) -> Self
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        let mut slots = [false; MONTHS_PER_TAX_YEAR];
        for contribution in contributions.into_iter().filter(|c| c.is_eligible()) {
            if let Some(offset) = tax_year.month_offset(contribution.date) {
                slots[offset] = true;
            }
        }
        Self(slots)
    }

    pub fn slots(&self) -> &[bool; MONTHS_PER_TAX_YEAR] {
        &self.0
    }

    pub fn is_active(&self, offset: usize) -> bool {
        self.0.get(offset).copied().unwrap_or(false)
    }

    pub fn months_covered(&self) -> usize {
        self.0.iter().filter(|active| **active).count()
    }

    pub fn first_active(&self) -> Option<usize> {
        self.0.iter().position(|active| *active)
    }

    /// Longest run of consecutive active slots. March does not wrap to April.
    pub fn longest_streak(&self) -> usize {
        let mut longest = 0;
        let mut current = 0;
        for active in self.0 {
            current = if active { current + 1 } else { 0 };
            longest = longest.max(current);
        }
        longest
    }
}

/// Result of scoring one tax year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyScore {
    pub tax_year: TaxYear,
    pub months_covered: u8,
    pub base_score: u8,
    pub heat_map: HeatMap,
    pub bonuses: Vec<Bonus>,
    pub score: u8,
    pub level: Level,
    pub next_level: Option<Level>,
    /// Percent of the way from this tier's floor to the next one; 100 at the top tier.
    pub progress_to_next: f64,
}

impl ConsistencyScore {
    pub fn bonus_points(&self) -> u8 {
        self.bonuses.iter().map(|bonus| bonus.points()).sum()
    }

    pub fn has_bonus(&self, bonus: Bonus) -> bool {
        self.bonuses.contains(&bonus)
    }
}

/// `round(months / 12 * 100)` in integer arithmetic; twelfths never land on a half.
pub fn base_score(months_covered: usize) -> u8 {
    let months = months_covered.min(MONTHS_PER_TAX_YEAR);
    ((months * 100 + MONTHS_PER_TAX_YEAR / 2) / MONTHS_PER_TAX_YEAR) as u8
}

/// Maps contributions to a score and tier. Holds only the tier table.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyScoringEngine {
    levels: LevelTable,
}

impl ConsistencyScoringEngine {
    pub fn new(levels: LevelTable) -> Self {
        Self { levels }
    }

    pub fn standard() -> Self {
        Self::new(LevelTable::standard())
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    /// Scores the eligible contributions dated inside `tax_year`; everything else is ignored.
    pub fn score<'a, I>(&self, tax_year: TaxYear, contributions: I) -> ConsistencyScore
    where
        I: IntoIterator<Item = &'a Contribution>,
    {
        let heat_map = HeatMap::build(&tax_year, contributions);
        let months_covered = heat_map.months_covered();
        let base = base_score(months_covered);
        let bonuses: Vec<Bonus> = if months_covered == 0 {
            Vec::new()
        } else {
            Bonus::ALL
                .into_iter()
                .filter(|bonus| bonus.earned(&heat_map))
                .collect()
        };
        let bonus_points: u16 = bonuses.iter().map(|bonus| u16::from(bonus.points())).sum();
        let score = (u16::from(base) + bonus_points).min(u16::from(MAX_SCORE)) as u8;

        let level = self.levels.level_for(score).clone();
        let next_level = self.levels.next_after(&level).cloned();
        let progress_to_next = progress(score, &level, next_level.as_ref());

        tracing::debug!(
            tax_year = %tax_year,
            months_covered,
            score,
            level = level.number,
            "scored tax year"
        );

        ConsistencyScore {
            tax_year,
            months_covered: months_covered as u8,
            base_score: base,
            heat_map,
            bonuses,
            score,
            level,
            next_level,
            progress_to_next,
        }
    }
}

fn progress(score: u8, level: &Level, next: Option<&Level>) -> f64 {
    match next {
        Some(next) => {
            let span = f64::from(next.min_score) - f64::from(level.min_score);
            let covered = f64::from(score) - f64::from(level.min_score);
            (covered / span * 100.0).clamp(0.0, 100.0)
        }
        None => 100.0,
    }
}

/// Raised when a fresh score lands in a higher tier than the one last stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelUp {
    pub previous: u8,
    pub level: Level,
}

impl LevelUp {
    /// Compares against the caller's stored tier number. No stored tier means no event.
    pub fn detect(previous: Option<u8>, score: &ConsistencyScore) -> Option<LevelUp> {
        let previous = previous?;
        (score.level.number > previous).then(|| LevelUp {
            previous,
            level: score.level.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use isa_domain::IsaType;
    use rust_decimal_macros::dec;

    fn on(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn paid(date: NaiveDateTime) -> Contribution {
        Contribution::new(IsaType::Cash, "Marcus", dec!(100), date).unwrap()
    }

    #[test]
    fn april_to_june_scores_forty_five() {
        let year = TaxYear::new(2024);
        let log = vec![
            paid(on(2024, 4, 10)),
            paid(on(2024, 5, 3)),
            paid(on(2024, 5, 28)),
            paid(on(2024, 6, 30)),
        ];
        let result = ConsistencyScoringEngine::standard().score(year, &log);
        assert_eq!(result.months_covered, 3);
        assert_eq!(result.base_score, 25);
        assert_eq!(result.bonuses, vec![Bonus::EarlyBird, Bonus::ActiveStreak]);
        assert_eq!(result.score, 45);
        assert_eq!(result.level.number, 3);
        assert_eq!((result.level.min_score, result.level.max_score), (30, 50));
        assert_eq!(result.progress_to_next, 75.0);
    }

    #[test]
    fn empty_year_scores_zero_in_lowest_tier() {
        let empty: Vec<Contribution> = Vec::new();
        let result = ConsistencyScoringEngine::standard().score(TaxYear::new(2024), &empty);
        assert_eq!(result.score, 0);
        assert!(result.bonuses.is_empty());
        assert_eq!(result.level.number, 1);
        assert_eq!(result.progress_to_next, 0.0);
    }

    #[test]
    fn ineligible_and_out_of_year_entries_are_ignored() {
        let year = TaxYear::new(2024);
        let mut deleted = paid(on(2024, 7, 1));
        deleted.deleted = true;
        let log = vec![deleted, paid(on(2024, 4, 5)), paid(on(2025, 4, 6))];
        let result = ConsistencyScoringEngine::standard().score(year, &log);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn closing_april_days_fold_into_march() {
        let year = TaxYear::new(2024);
        let map = HeatMap::build(&year, &vec![paid(on(2025, 4, 3))]);
        assert!(map.is_active(11));
        assert_eq!(map.months_covered(), 1);
    }

    #[test]
    fn streak_does_not_wrap_around_the_year() {
        let year = TaxYear::new(2024);
        let log = vec![paid(on(2024, 4, 6)), paid(on(2025, 2, 1)), paid(on(2025, 3, 1))];
        let result = ConsistencyScoringEngine::standard().score(year, &log);
        assert!(!result.has_bonus(Bonus::ActiveStreak));
        assert!(result.has_bonus(Bonus::EarlyBird));
        assert_eq!(result.heat_map.longest_streak(), 2);
    }

    #[test]
    fn full_year_is_clamped_to_one_hundred() {
        let year = TaxYear::new(2024);
        let log: Vec<_> = (0..12)
            .map(|offset| {
                let month = (offset + 3) % 12 + 1;
                let calendar_year = if month >= 4 { 2024 } else { 2025 };
                paid(on(calendar_year, month, 15))
            })
            .collect();
        let result = ConsistencyScoringEngine::standard().score(year, &log);
        assert_eq!(result.base_score, 100);
        assert_eq!(result.bonus_points(), 25);
        assert_eq!(result.score, 100);
        assert_eq!(result.level.number, 7);
        assert!(result.next_level.is_none());
        assert_eq!(result.progress_to_next, 100.0);
    }

    #[test]
    fn base_score_rounds_to_nearest() {
        assert_eq!(base_score(0), 0);
        assert_eq!(base_score(1), 8);
        assert_eq!(base_score(5), 42);
        assert_eq!(base_score(11), 92);
        assert_eq!(base_score(12), 100);
    }

    #[test]
    fn level_up_fires_only_on_a_higher_tier() {
        let year = TaxYear::new(2024);
        let log = vec![paid(on(2024, 4, 10)), paid(on(2024, 5, 10)), paid(on(2024, 6, 10))];
        let result = ConsistencyScoringEngine::standard().score(year, &log);
        assert_eq!(LevelUp::detect(None, &result), None);
        assert_eq!(LevelUp::detect(Some(3), &result), None);
        let event = LevelUp::detect(Some(1), &result).expect("level up");
        assert_eq!(event.previous, 1);
        assert_eq!(event.level.number, 3);
    }
}
