use isa_core::{
    public_api::{api_audit, api_check_deposit, api_score, api_tax_year_summary, ApiTaxYearSummary},
    CoreError,
};
use isa_domain::TaxYear;
use rust_decimal::Decimal;

use crate::cli::commands::{contribution::print_allocation, CommandDefinition};
use crate::cli::context::{
    date_at, parse_date, parse_isa_type, parse_money, parse_tax_year, CommandError,
    CommandResult, ShellContext,
};
use crate::cli::io;
use crate::cli::output::{section, table};

const SUMMARY_USAGE: &str = "summary [<tax-year>] [--json]";
const CHECK_USAGE: &str = "check <provider> <type> <amount> [YYYY-MM-DD]";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "summary",
            "Show allowance use and the per-provider breakdown for a tax year",
            SUMMARY_USAGE,
            cmd_summary,
        ),
        CommandDefinition::new(
            "check",
            "Test whether a deposit would fit without recording it",
            CHECK_USAGE,
            cmd_check,
        ),
        CommandDefinition::new(
            "years",
            "List selectable tax years with totals and scores",
            "years",
            cmd_years,
        ),
        CommandDefinition::new(
            "audit",
            "Report data anomalies and years over the allowance",
            "audit",
            cmd_audit,
        ),
    ]
}

fn cmd_summary(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let as_json = args.iter().any(|arg| *arg == "--json");
    let rest: Vec<&str> = args.iter().copied().filter(|a| *a != "--json").collect();
    let current = context.calendar.current();
    let tax_year = match rest.as_slice() {
        [] => current,
        [value] => parse_tax_year(value, current)?,
        _ => return Err(CommandError::usage(SUMMARY_USAGE)),
    };

    let book = context.load_book()?;
    let summary = api_tax_year_summary(&book, &context.limits(), tax_year);
    if as_json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| CoreError::Serde(err.to_string()))?;
        println!("{json}");
        return Ok(());
    }
    print_summary(context, &summary);
    Ok(())
}

fn print_summary(context: &ShellContext, summary: &ApiTaxYearSummary) {
    section(format!("Allowance: {}", summary.tax_year));
    let lines = [
        ("Annual allowance", summary.annual_allowance),
        ("Paid in", summary.gross_contributed),
        ("Allowance used", summary.allowance_used),
        ("New allowance left", summary.new_allowance_left),
        ("Lifetime ISA headroom", summary.lifetime_headroom),
    ];
    for (label, amount) in lines {
        io::print_info(format!("  {:<22} {:>10}", label, context.money(amount)));
    }
    if summary.unused_allowance < Decimal::ZERO {
        io::print_warning(format!(
            "{} is over its allowance by {}; run `audit` for details.",
            summary.tax_year,
            context.money(-summary.unused_allowance)
        ));
    }
    for account in summary.position.replacement.iter().filter(|a| !a.available.is_zero()) {
        io::print_info(format!(
            "  {} {} can also take {} back in without using new allowance",
            account.provider,
            account.isa_type,
            context.money(account.available)
        ));
    }

    if summary.breakdown.is_empty() {
        return;
    }
    section("By ISA type and provider");
    let mut rows = Vec::new();
    for (isa_type, totals) in &summary.breakdown {
        for provider in &totals.providers {
            rows.push(vec![
                isa_type.to_string(),
                provider.provider.clone(),
                context.money(provider.total),
            ]);
        }
        rows.push(vec![
            String::new(),
            "subtotal".into(),
            context.money(totals.grand_total),
        ]);
    }
    table(&["Type", "Provider", "Total"], &rows);
}

fn cmd_check(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (provider, isa_type, amount, date) = match args {
        [provider, isa_type, amount] => (*provider, *isa_type, *amount, None),
        [provider, isa_type, amount, date] => (*provider, *isa_type, *amount, Some(*date)),
        _ => return Err(CommandError::usage(CHECK_USAGE)),
    };
    let isa_type = parse_isa_type(isa_type)?;
    let amount = parse_money(amount)?;
    let now = context.calendar.now();
    let date = match date {
        Some(value) => date_at(parse_date(value)?, now),
        None => now,
    };

    let book = context.load_book()?;
    let allocation = api_check_deposit(&book, &context.limits(), provider, isa_type, amount, date)?;
    io::print_success(format!(
        "{} into {} {} fits within {}.",
        context.money(amount),
        provider,
        isa_type,
        TaxYear::containing(date)
    ));
    print_allocation(context, &allocation);
    Ok(())
}

fn cmd_years(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let current = context.calendar.current();
    let mut years = context
        .calendar
        .available(context.config.history_years, context.config.future_years);
    let book = context.load_book()?;
    for year in book.active_tax_years() {
        if !years.contains(&year) {
            years.push(year);
        }
    }
    years.sort_unstable_by(|a, b| b.cmp(a));

    let limits = context.limits();
    let rows: Vec<Vec<String>> = years
        .iter()
        .map(|year| {
            let summary = api_tax_year_summary(&book, &limits, *year);
            let score = api_score(&book, &context.engine, *year);
            let marker = if *year == current { "*" } else { "" };
            vec![
                format!("{}{}", year.long_label(), marker),
                context.money(summary.allowance_used),
                context.money(summary.new_allowance_left),
                context.money(summary.replacement_allowance),
                score.score.to_string(),
                score.level.name.clone(),
            ]
        })
        .collect();
    section("Tax years");
    table(
        &["Year", "Used", "New allowance", "Replaceable", "Score", "Level"],
        &rows,
    );
    io::print_hint("* current tax year; replaceable amounts only go back into the account they left");
    Ok(())
}

fn cmd_audit(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let book = context.load_book()?;
    let warnings = book.warnings();
    let breaches = api_audit(&book, &context.limits());

    section("Audit");
    for warning in &warnings {
        io::print_warning(warning);
    }
    for breach in &breaches {
        io::print_warning(format!(
            "{}: {} counted against a {} allowance ({} over)",
            breach.tax_year,
            context.money(breach.contributed),
            context.money(breach.allowance),
            context.money(breach.excess)
        ));
    }
    if warnings.is_empty() && breaches.is_empty() {
        io::print_success("No issues found.");
    }
    Ok(())
}
