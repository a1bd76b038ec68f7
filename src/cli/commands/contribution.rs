use isa_core::{
    public_api::{
        api_mark_withdrawn, api_record_contribution, api_record_withdrawal, api_restore,
        api_soft_delete, api_tax_year_summary,
    },
    AddContributionWizard, ContributionLedger, CoreError, DepositAllocation, FlexibilityService,
    IsaBook, WizardOutcome, WizardStep,
};
use isa_domain::{
    Contribution, Displayable, FlexibilityPolicy, FlexibilitySettings, IsaType, Withdrawal,
};

use crate::cli::commands::{score, CommandDefinition};
use crate::cli::context::{
    date_at, parse_date, parse_isa_type, parse_money, parse_tax_year, short_id, CommandError,
    CommandResult, ShellContext,
};
use crate::cli::io;
use crate::cli::output::{section, table};

const ADD_USAGE: &str =
    "add [<provider> <type> <amount> [YYYY-MM-DD] [flexible|fixed] [--note <text>]]";
const WITHDRAW_USAGE: &str = "withdraw <provider> <type> <amount> [YYYY-MM-DD] [--note <text>]";
const LIST_USAGE: &str = "list [<tax-year>|all] [--deleted]";
const DELETE_USAGE: &str = "delete <id> | delete --withdrawn <id> | delete --undo <id>";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "add",
            "Record a contribution (guided when run without arguments)",
            ADD_USAGE,
            cmd_add,
        ),
        CommandDefinition::new(
            "withdraw",
            "Record a withdrawal from an ISA account",
            WITHDRAW_USAGE,
            cmd_withdraw,
        ),
        CommandDefinition::new(
            "list",
            "List contributions and withdrawals for a tax year",
            LIST_USAGE,
            cmd_list,
        ),
        CommandDefinition::new(
            "delete",
            "Delete, mark withdrawn or restore a contribution",
            DELETE_USAGE,
            cmd_delete,
        ),
    ]
}

/// Arguments of the one-line `add` form.
#[derive(Debug, PartialEq)]
struct AddArgs {
    provider: String,
    isa_type: IsaType,
    amount: String,
    date: Option<chrono::NaiveDate>,
    flexible: Option<bool>,
    note: Option<String>,
}

impl AddArgs {
    fn parse(args: &[&str]) -> Result<Self, CommandError> {
        let [provider, isa_type, amount, rest @ ..] = args else {
            return Err(CommandError::usage(ADD_USAGE));
        };
        let mut parsed = AddArgs {
            provider: provider.to_string(),
            isa_type: parse_isa_type(isa_type)?,
            amount: amount.to_string(),
            date: None,
            flexible: None,
            note: None,
        };
        let (options, note) = split_note(rest)?;
        parsed.note = note;
        for option in options {
            match option.to_ascii_lowercase().as_str() {
                "flexible" | "--flexible" => parsed.flexible = Some(true),
                "fixed" | "--fixed" | "--not-flexible" => parsed.flexible = Some(false),
                _ => parsed.date = Some(parse_date(option)?),
            }
        }
        Ok(parsed)
    }
}

/// Separates a trailing `--note <text...>` from the other options.
fn split_note<'a>(args: &'a [&'a str]) -> Result<(&'a [&'a str], Option<String>), CommandError> {
    match args.iter().position(|arg| *arg == "--note") {
        None => Ok((args, None)),
        Some(idx) if idx + 1 < args.len() => Ok((&args[..idx], Some(args[idx + 1..].join(" ")))),
        Some(_) => Err(CommandError::InvalidArguments("--note needs some text".into())),
    }
}

fn cmd_add(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() {
        if !context.can_prompt() {
            return Err(CommandError::usage(ADD_USAGE));
        }
        return add_guided(context);
    }

    let parsed = AddArgs::parse(args)?;
    let book = context.load_book()?;
    let now = context.calendar.now();
    let date = parsed.date.map(|d| date_at(d, now)).unwrap_or(now);

    let mut wizard = AddContributionWizard::new(date, &book.flexibility, &book.contributions);
    wizard.choose_provider(&parsed.provider)?;
    wizard.choose_type(parsed.isa_type)?;
    if wizard.enter_amount_text(&parsed.amount)? == WizardStep::ConfirmFlexibility {
        let flexible = parsed.flexible.ok_or_else(|| {
            CommandError::InvalidArguments(format!(
                "flexibility of {} {} is not known yet; add `flexible` or `fixed`",
                parsed.provider, parsed.isa_type
            ))
        })?;
        wizard.confirm_flexibility(flexible)?;
    } else if let Some(flexible) = parsed.flexible {
        check_stated_flexibility(&book.flexibility, &parsed.provider, parsed.isa_type, flexible)?;
    }
    if let Some(note) = parsed.note {
        wizard.set_notes(note);
    }
    let outcome = wizard.finish()?;
    record(context, book, outcome)
}

/// A `flexible`/`fixed` option for an account whose policy is already settled must agree with it.
fn check_stated_flexibility(
    settings: &FlexibilitySettings,
    provider: &str,
    isa_type: IsaType,
    flexible: bool,
) -> Result<(), CommandError> {
    FlexibilityPolicy::new(provider, isa_type, flexible).map_err(CoreError::from)?;
    match settings.get(provider, isa_type) {
        Some(known) if known != flexible => Err(CommandError::InvalidArguments(format!(
            "{} {} is recorded as {}; change it with `flex set` first",
            provider,
            isa_type,
            if known { "flexible" } else { "not flexible" }
        ))),
        _ => Ok(()),
    }
}

/// Walks the wizard with prompts. Each step offers a way back.
fn add_guided(context: &mut ShellContext) -> CommandResult {
    let book = context.load_book()?;
    let now = context.calendar.now();
    let raw_date = io::prompt_text(&context.theme, "Date (YYYY-MM-DD, blank for today)", true)?;
    let date = match raw_date.trim() {
        "" => now,
        value => date_at(parse_date(value)?, now),
    };

    let mut wizard = AddContributionWizard::new(date, &book.flexibility, &book.contributions);
    while !wizard.is_done() {
        let step = match wizard.step() {
            WizardStep::ChooseProvider => {
                let provider = io::prompt_text(&context.theme, "Provider", true)?;
                if provider.trim().is_empty() {
                    return Err(CommandError::Cancelled);
                }
                wizard.choose_provider(&provider)
            }
            WizardStep::ChooseType => {
                let mut labels: Vec<String> =
                    IsaType::ALL.iter().map(ToString::to_string).collect();
                labels.push("Back".into());
                match io::select(&context.theme, "ISA type", &labels)? {
                    None => return Err(CommandError::Cancelled),
                    Some(idx) if idx == IsaType::ALL.len() => wizard.back(),
                    Some(idx) => wizard.choose_type(IsaType::ALL[idx]),
                }
            }
            WizardStep::EnterAmount => {
                let amount = io::prompt_text(&context.theme, "Amount (blank to go back)", true)?;
                if amount.trim().is_empty() {
                    wizard.back()
                } else {
                    wizard.enter_amount_text(&amount)
                }
            }
            WizardStep::ConfirmFlexibility => {
                let prompt = format!(
                    "Is {} {} a flexible ISA?",
                    wizard.provider().unwrap_or_default(),
                    wizard.isa_type().map(|t| t.to_string()).unwrap_or_default()
                );
                match io::select(&context.theme, &prompt, &["Flexible", "Not flexible", "Back"])? {
                    None => return Err(CommandError::Cancelled),
                    Some(0) => wizard.confirm_flexibility(true),
                    Some(1) => wizard.confirm_flexibility(false),
                    Some(_) => wizard.back(),
                }
            }
            WizardStep::Done => break,
        };
        if let Err(err) = step {
            io::print_warning(err);
        }
    }

    let notes = io::prompt_text(&context.theme, "Notes (optional)", true)?;
    if !notes.trim().is_empty() {
        wizard.set_notes(notes);
    }
    let outcome = wizard.finish()?;
    let question = format!(
        "Record {} into {} {} on {}?",
        context.money(outcome.contribution.amount),
        outcome.contribution.provider,
        outcome.contribution.isa_type,
        outcome.contribution.date.format("%Y-%m-%d")
    );
    if !io::confirm_action(&context.theme, &question, true)? {
        return Err(CommandError::Cancelled);
    }
    record(context, book, outcome)
}

fn record(context: &mut ShellContext, mut book: IsaBook, outcome: WizardOutcome) -> CommandResult {
    let tax_year = outcome.contribution.tax_year();
    let limits = context.limits();
    let (id, allocation) =
        api_record_contribution(&mut book, &limits, outcome.contribution, outcome.policy)?;
    book.save(&context.storage)?;

    io::print_success(format!(
        "Contribution {} recorded in {}.",
        short_id(id),
        tax_year
    ));
    print_allocation(context, &allocation);
    if tax_year == context.calendar.current() {
        score::track_level(context, &book)?;
    }
    Ok(())
}

pub(crate) fn print_allocation(context: &ShellContext, allocation: &DepositAllocation) {
    if !allocation.allocated_to_replacement.is_zero() {
        io::print_info(format!(
            "  {} restores previously withdrawn allowance",
            context.money(allocation.allocated_to_replacement)
        ));
    }
    io::print_info(format!(
        "  {} uses this year's allowance",
        context.money(allocation.allocated_to_unused)
    ));
    io::print_info(format!(
        "  Remaining capacity afterwards: {}",
        context.money(allocation.total_remaining_capacity)
    ));
}

fn cmd_withdraw(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [provider, isa_type, amount, rest @ ..] = args else {
        return Err(CommandError::usage(WITHDRAW_USAGE));
    };
    let isa_type = parse_isa_type(isa_type)?;
    let amount = parse_money(amount)?;
    let (options, note) = split_note(rest)?;
    let now = context.calendar.now();
    let date = match options {
        [] => now,
        [date] => date_at(parse_date(date)?, now),
        _ => return Err(CommandError::usage(WITHDRAW_USAGE)),
    };

    let mut withdrawal =
        Withdrawal::new(isa_type, *provider, amount, date).map_err(CoreError::from)?;
    if let Some(note) = note {
        withdrawal = withdrawal.with_notes(note);
    }
    let tax_year = withdrawal.tax_year();
    let limits = context.limits();
    let summary = context.update_book(|book| {
        api_record_withdrawal(book, withdrawal)?;
        Ok(api_tax_year_summary(book, &limits, tax_year))
    })?;

    io::print_success(format!(
        "Withdrawal of {} from {} {} recorded.",
        context.money(amount),
        provider,
        isa_type
    ));
    let book = context.load_book()?;
    match FlexibilityService::describe(&book.flexibility, provider, isa_type) {
        "flexible" => io::print_info(format!(
            "  Replacement allowance for this account in {}: {}",
            tax_year,
            context.money(summary.position.replacement_for(provider, isa_type))
        )),
        description => io::print_warning(format!(
            "{} {} is {}: this withdrawal does not restore allowance.",
            provider, isa_type, description
        )),
    }
    Ok(())
}

fn cmd_list(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let show_deleted = args.iter().any(|arg| *arg == "--deleted");
    let scope: Vec<&str> = args.iter().copied().filter(|a| *a != "--deleted").collect();
    let current = context.calendar.current();
    let tax_year = match scope.as_slice() {
        [] => Some(current),
        [value] if value.eq_ignore_ascii_case("all") => None,
        [value] => Some(parse_tax_year(value, current)?),
        _ => return Err(CommandError::usage(LIST_USAGE)),
    };

    let book = context.load_book()?;
    let contributions: Vec<&Contribution> = match &tax_year {
        Some(year) => book.contributions_in(year),
        None => book.contributions.iter().collect(),
    };
    let withdrawals: Vec<&Withdrawal> = book
        .withdrawals
        .iter()
        .filter(|w| tax_year.map_or(true, |year| year.contains(w.date)))
        .collect();

    let title = tax_year.map_or_else(|| "all tax years".to_string(), |year| year.to_string());
    section(format!("Contributions: {}", title));
    let rows: Vec<Vec<String>> = contributions
        .iter()
        .filter(|c| show_deleted || !c.deleted)
        .map(|c| {
            vec![
                short_id(c.id),
                c.date.format("%Y-%m-%d").to_string(),
                c.isa_type.key().to_string(),
                c.provider.clone(),
                context.money(c.amount),
                status(c).to_string(),
                c.notes.clone().unwrap_or_default(),
            ]
        })
        .collect();
    if rows.is_empty() {
        io::print_info("No contributions recorded.");
    } else {
        table(
            &["ID", "Date", "Type", "Provider", "Amount", "Status", "Notes"],
            &rows,
        );
        io::print_info(format!(
            "Counted total: {}",
            context.money(ContributionLedger::total_contributed(
                contributions.iter().copied()
            ))
        ));
    }

    if !withdrawals.is_empty() {
        section(format!("Withdrawals: {}", title));
        let rows: Vec<Vec<String>> = withdrawals
            .iter()
            .map(|w| {
                vec![
                    w.date.format("%Y-%m-%d").to_string(),
                    w.isa_type.key().to_string(),
                    w.provider.clone(),
                    context.money(w.amount),
                    FlexibilityService::describe(&book.flexibility, &w.provider, w.isa_type)
                        .to_string(),
                ]
            })
            .collect();
        table(&["Date", "Type", "Provider", "Amount", "Flexibility"], &rows);
    }
    Ok(())
}

fn status(contribution: &Contribution) -> &'static str {
    match (contribution.deleted, contribution.withdrawn) {
        (true, _) => "deleted",
        (false, true) => "withdrawn",
        (false, false) => "active",
    }
}

fn cmd_delete(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (action, reference) = match args {
        [reference] => ("--delete", *reference),
        [flag, reference] => (*flag, *reference),
        _ => return Err(CommandError::usage(DELETE_USAGE)),
    };
    let (message, label) = context.update_book(|book| {
        let id = ContributionLedger::resolve_id(&book.contributions, reference)?;
        let verb = match action {
            "--delete" => {
                api_soft_delete(book, id)?;
                "deleted"
            }
            "--withdrawn" => {
                api_mark_withdrawn(book, id)?;
                "marked as withdrawn"
            }
            "--undo" | "--restore" => {
                api_restore(book, id)?;
                "restored"
            }
            _ => return Err(CommandError::usage(DELETE_USAGE)),
        };
        let label = book
            .contributions
            .iter()
            .find(|contribution| contribution.id == id)
            .map(|contribution| contribution.display_label())
            .unwrap_or_default();
        Ok((format!("Contribution {} {}.", short_id(id), verb), label))
    })?;
    io::print_success(message);
    io::print_hint(label);
    let book = context.load_book()?;
    score::track_level(context, &book)
}
