use isa_config::Config;

use crate::cli::commands::CommandDefinition;
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::output::section;

const CONFIG_USAGE: &str =
    "config [show|get <key>|set <key> <value>|backup [note]|backups|restore <name>]";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "config",
        "View and manage preferences and allowance limits",
        CONFIG_USAGE,
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((action, rest)) = args.split_first() else {
        return show(context);
    };
    match (action.to_lowercase().as_str(), rest) {
        ("show", []) => show(context),
        ("get", [key]) => {
            io::print_info(format!("{} = {}", key, context.config.get_value(key)?));
            Ok(())
        }
        ("set", [key, value @ ..]) if !value.is_empty() => {
            let value = value.join(" ");
            context.config.set_value(key, &value)?;
            context.persist_config()?;
            context.apply_config()?;
            tracing::info!(key = *key, "configuration updated");
            io::print_success(format!("{} set to {}.", key, context.config.get_value(key)?));
            Ok(())
        }
        ("backup", note) => {
            let note = (!note.is_empty()).then(|| note.join(" "));
            let name = context
                .config_manager
                .backup(&context.config, note.as_deref())?;
            io::print_success(format!("Configuration backed up as `{}`.", name));
            Ok(())
        }
        ("backups", []) => {
            let backups = context.config_manager.list_backups()?;
            if backups.is_empty() {
                io::print_info("No configuration backups yet.");
            }
            for (idx, name) in backups.iter().enumerate() {
                io::print_info(format!("  {:>2}. {}", idx + 1, name));
            }
            Ok(())
        }
        ("restore", [reference]) => restore(context, reference),
        _ => Err(CommandError::usage(CONFIG_USAGE)),
    }
}

fn show(context: &ShellContext) -> CommandResult {
    section("Configuration");
    for key in Config::KEYS {
        io::print_info(format!("  {:<20} {}", key, context.config.get_value(key)?));
    }
    let last_level = context
        .config
        .last_level
        .map(|level| level.to_string())
        .unwrap_or_else(|| "-".into());
    io::print_info(format!("  {:<20} {}", "last_level", last_level));
    io::print_hint(format!(
        "stored in {}",
        context.config_manager.config_path().display()
    ));
    Ok(())
}

/// `reference` is a backup file name or its 1-based position in `config backups`.
fn restore(context: &mut ShellContext, reference: &str) -> CommandResult {
    let backups = context.config_manager.list_backups()?;
    let name = match reference.parse::<usize>() {
        Ok(position) if position >= 1 && position <= backups.len() => backups[position - 1].clone(),
        _ => reference.to_string(),
    };
    let restored = context.config_manager.restore(&name)?;
    context
        .config_manager
        .backup(&context.config, Some("pre-restore"))?;
    context.config = restored;
    context.persist_config()?;
    context.apply_config()?;
    io::print_success(format!("Configuration restored from `{}`.", name));
    Ok(())
}
