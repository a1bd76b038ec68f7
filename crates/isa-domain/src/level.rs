//! Consistency levels: an ordered, contiguous partition of the 0..=100 score range.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest attainable consistency score.
pub const MAX_SCORE: u8 = 100;

/// A named tier covering `[min_score, max_score)`. The terminal tier also contains 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Level {
    pub number: u8,
    pub name: String,
    pub color: String,
    pub reward: String,
    pub min_score: u8,
    pub max_score: u8,
}

impl Level {
    pub fn new(
        number: u8,
        name: impl Into<String>,
        color: impl Into<String>,
        reward: impl Into<String>,
        min_score: u8,
        max_score: u8,
    ) -> Self {
        Self {
            number,
            name: name.into(),
            color: color.into(),
            reward: reward.into(),
            min_score,
            max_score,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {} · {}", self.number, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelTableError {
    Empty,
    DoesNotStartAtZero(u8),
    DoesNotEndAtMax(u8),
    Gap { after: u8, next_min: u8 },
    EmptyTier(u8),
    OutOfOrder(u8),
}

impl fmt::Display for LevelTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelTableError::Empty => f.write_str("level table must contain at least one tier"),
            LevelTableError::DoesNotStartAtZero(min) => {
                write!(f, "first tier must start at 0, found {min}")
            }
            LevelTableError::DoesNotEndAtMax(max) => {
                write!(f, "last tier must end at {MAX_SCORE}, found {max}")
            }
            LevelTableError::Gap { after, next_min } => write!(
                f,
                "tier {after} does not meet the next tier's lower bound {next_min}"
            ),
            LevelTableError::EmptyTier(number) => write!(f, "tier {number} covers no scores"),
            LevelTableError::OutOfOrder(number) => {
                write!(f, "tier {number} is not numbered in ascending order")
            }
        }
    }
}

impl std::error::Error for LevelTableError {}

/// Validated set of tiers, ordered by `number`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LevelTable {
    levels: Vec<Level>,
}

impl LevelTable {
    /// Builds a table, checking the tiers are contiguous and cover `0..=100` exactly.
    pub fn new(levels: Vec<Level>) -> Result<Self, LevelTableError> {
        let first = levels.first().ok_or(LevelTableError::Empty)?;
        if first.min_score != 0 {
            return Err(LevelTableError::DoesNotStartAtZero(first.min_score));
        }
        for level in &levels {
            if level.max_score <= level.min_score {
                return Err(LevelTableError::EmptyTier(level.number));
            }
        }
        for pair in levels.windows(2) {
            if pair[1].number <= pair[0].number {
                return Err(LevelTableError::OutOfOrder(pair[1].number));
            }
            if pair[0].max_score != pair[1].min_score {
                return Err(LevelTableError::Gap {
                    after: pair[0].number,
                    next_min: pair[1].min_score,
                });
            }
        }
        let last = levels.last().ok_or(LevelTableError::Empty)?;
        if last.max_score != MAX_SCORE {
            return Err(LevelTableError::DoesNotEndAtMax(last.max_score));
        }
        Ok(Self { levels })
    }

    /// Seven tiers on the 0, 15, 30, 50, 65, 80, 90, 100 thresholds.
    pub fn standard() -> Self {
        Self {
            levels: vec![
                Level::new(1, "Seedling", "#9CA3AF", "Welcome badge", 0, 15),
                Level::new(2, "Starter", "#60A5FA", "Starter badge", 15, 30),
                Level::new(3, "Steady Saver", "#34D399", "Streak tracker unlocked", 30, 50),
                Level::new(4, "Builder", "#A3E635", "Builder badge", 50, 65),
                Level::new(5, "Achiever", "#FBBF24", "Custom dashboard theme", 65, 80),
                Level::new(6, "Champion", "#F97316", "Champion trophy", 80, 90),
                Level::new(7, "ISA Legend", "#A855F7", "Legend crown", 90, 100),
            ],
        }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// The unique tier containing `score`; scores above 100 land in the terminal tier.
    pub fn level_for(&self, score: u8) -> &Level {
        self.levels
            .iter()
            .find(|level| score >= level.min_score && score < level.max_score)
            .unwrap_or_else(|| self.terminal())
    }

    /// The tier that follows `level`, or `None` at the top.
    pub fn next_after(&self, level: &Level) -> Option<&Level> {
        self.levels
            .iter()
            .find(|candidate| candidate.number > level.number)
    }

    pub fn by_number(&self, number: u8) -> Option<&Level> {
        self.levels.iter().find(|level| level.number == number)
    }

    fn terminal(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl<'de> Deserialize<'de> for LevelTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            levels: Vec<Level>,
        }
        let raw = Raw::deserialize(deserializer)?;
        LevelTable::new(raw.levels).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_valid() {
        let standard = LevelTable::standard();
        let rebuilt = LevelTable::new(standard.levels().to_vec()).expect("valid table");
        assert_eq!(rebuilt, standard);
    }

    #[test]
    fn every_score_maps_to_exactly_one_tier() {
        let table = LevelTable::standard();
        for score in 0..=MAX_SCORE {
            let matches = table
                .levels()
                .iter()
                .filter(|level| {
                    (score >= level.min_score && score < level.max_score)
                        || (score == MAX_SCORE && level.max_score == MAX_SCORE)
                })
                .count();
            assert_eq!(matches, 1, "score {score}");
            let level = table.level_for(score);
            assert!(score >= level.min_score);
        }
    }

    #[test]
    fn boundaries_belong_to_the_upper_tier() {
        let table = LevelTable::standard();
        assert_eq!(table.level_for(0).number, 1);
        assert_eq!(table.level_for(14).number, 1);
        assert_eq!(table.level_for(15).number, 2);
        assert_eq!(table.level_for(45).number, 3);
        assert_eq!(table.level_for(90).number, 7);
        assert_eq!(table.level_for(100).number, 7);
    }

    #[test]
    fn rejects_gaps_and_bad_bounds() {
        let gap = vec![
            Level::new(1, "A", "#000", "", 0, 40),
            Level::new(2, "B", "#000", "", 50, 100),
        ];
        assert_eq!(
            LevelTable::new(gap).unwrap_err(),
            LevelTableError::Gap {
                after: 1,
                next_min: 50
            }
        );
        let short = vec![Level::new(1, "A", "#000", "", 0, 90)];
        assert_eq!(
            LevelTable::new(short).unwrap_err(),
            LevelTableError::DoesNotEndAtMax(90)
        );
        assert_eq!(LevelTable::new(Vec::new()).unwrap_err(), LevelTableError::Empty);
    }

    #[test]
    fn next_after_stops_at_terminal_tier() {
        let table = LevelTable::standard();
        let top = table.level_for(100);
        assert!(table.next_after(top).is_none());
        let first = table.level_for(0);
        assert_eq!(table.next_after(first).map(|level| level.number), Some(2));
    }
}
