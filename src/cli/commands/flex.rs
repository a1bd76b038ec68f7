use isa_core::{public_api::api_set_flexibility, FlexibilityService};

use crate::cli::commands::CommandDefinition;
use crate::cli::context::{parse_isa_type, CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::output::{section, table};

const FLEX_USAGE: &str =
    "flex [show] | flex set <provider> <type> <on|off> | flex clear <provider> <type>";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "flex",
        "Show or change which accounts are flexible ISAs",
        FLEX_USAGE,
        cmd_flex,
    )]
}

fn cmd_flex(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args {
        [] | ["show"] => show(context),
        ["set", provider, isa_type, value] => {
            let isa_type = parse_isa_type(isa_type)?;
            let flexible = match value.to_ascii_lowercase().as_str() {
                "on" | "yes" | "true" | "flexible" => true,
                "off" | "no" | "false" | "fixed" => false,
                other => {
                    return Err(CommandError::InvalidArguments(format!(
                        "expected on or off, got `{other}`"
                    )))
                }
            };
            context.update_book(|book| {
                Ok(api_set_flexibility(book, provider, isa_type, flexible)?)
            })?;
            io::print_success(format!(
                "{} {} is now {}.",
                provider,
                isa_type,
                if flexible { "flexible" } else { "not flexible" }
            ));
            Ok(())
        }
        ["clear", provider, isa_type] => {
            let isa_type = parse_isa_type(isa_type)?;
            let removed = context.update_book(|book| {
                Ok(FlexibilityService::clear(
                    &mut book.flexibility,
                    provider,
                    isa_type,
                ))
            })?;
            if removed {
                io::print_success(format!("Flexibility of {} {} cleared.", provider, isa_type));
            } else {
                io::print_info(format!("No policy stored for {} {}.", provider, isa_type));
            }
            Ok(())
        }
        _ => Err(CommandError::usage(FLEX_USAGE)),
    }
}

fn show(context: &ShellContext) -> CommandResult {
    let book = context.load_book()?;
    section("Flexibility");
    let rows: Vec<Vec<String>> = book
        .flexibility
        .policies()
        .iter()
        .map(|policy| {
            vec![
                policy.provider().to_string(),
                policy.isa_type().to_string(),
                FlexibilityService::describe(
                    &book.flexibility,
                    policy.provider(),
                    policy.isa_type(),
                )
                .to_string(),
            ]
        })
        .collect();
    if rows.is_empty() {
        io::print_info("No flexibility policies stored yet.");
    } else {
        table(&["Provider", "Type", "Policy"], &rows);
    }
    io::print_hint("Lifetime ISAs are never flexible.");
    Ok(())
}
