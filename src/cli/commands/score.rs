use colored::Colorize;
use isa_core::{public_api::api_score, Bonus, ConsistencyScore, IsaBook, LevelUp};
use isa_domain::TaxYear;

use crate::cli::commands::CommandDefinition;
use crate::cli::context::{parse_tax_year, CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::output::section;

const SCORE_USAGE: &str = "score [<tax-year>]";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "score",
        "Show the consistency score, monthly heat map and level",
        SCORE_USAGE,
        cmd_score,
    )]
}

fn cmd_score(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let current = context.calendar.current();
    let tax_year = match args {
        [] => current,
        [value] => parse_tax_year(value, current)?,
        _ => return Err(CommandError::usage(SCORE_USAGE)),
    };
    let book = context.load_book()?;
    let score = api_score(&book, &context.engine, tax_year);
    print_score(&score);
    if tax_year == current {
        track_level(context, &book)?;
    }
    Ok(())
}

fn print_score(score: &ConsistencyScore) {
    section(format!("Consistency score: {}", score.tax_year));
    io::print_info(format!("  {}", heat_map_line(score)));
    io::print_info(format!(
        "  Months with a contribution: {}/12 (base {})",
        score.months_covered, score.base_score
    ));
    for bonus in Bonus::ALL {
        let mark = if score.has_bonus(bonus) { "+" } else { " " };
        io::print_info(format!(
            "  [{}] {:<15} +{:<3} {}",
            mark,
            bonus.to_string(),
            bonus.points(),
            bonus.description()
        ));
    }
    io::print_info(format!(
        "  Score: {} / 100  Level {}: {}",
        score.score.to_string().bold(),
        score.level.number,
        score.level.name
    ));
    match &score.next_level {
        Some(next) => io::print_info(format!(
            "  {:.0}% of the way to level {} ({}) at {} points",
            score.progress_to_next, next.number, next.name, next.min_score
        )),
        None => io::print_info("  Top level reached."),
    }
}

/// One cell per month, April first. Filled cells are months with a contribution.
pub(crate) fn heat_map_line(score: &ConsistencyScore) -> String {
    TaxYear::month_labels()
        .iter()
        .enumerate()
        .map(|(offset, label)| {
            if score.heat_map.is_active(offset) {
                format!("{}", label.green().bold())
            } else {
                format!("{}", label.dimmed())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compares the current-year level with the last one stored and persists the new one.
pub(crate) fn track_level(context: &mut ShellContext, book: &IsaBook) -> CommandResult {
    let score = api_score(book, &context.engine, context.calendar.current());
    if let Some(level_up) = LevelUp::detect(context.config.last_level, &score) {
        io::print_success(format!(
            "Level up! {} -> level {}: {} ({})",
            level_up.previous, level_up.level.number, level_up.level.name, level_up.level.reward
        ));
    }
    if context.config.last_level != Some(score.level.number) {
        tracing::debug!(level = score.level.number, "storing level");
        context.config.last_level = Some(score.level.number);
        context.persist_config()?;
    }
    Ok(())
}
