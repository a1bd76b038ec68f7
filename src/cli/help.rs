use crate::cli::commands::{CommandDefinition, CommandRegistry};
use crate::cli::io;
use crate::cli::output::section;

pub fn print_overview(registry: &CommandRegistry) {
    section("Available commands");
    for entry in registry.iter() {
        io::print_info(format!("  {:<10} {}", entry.name, entry.description));
    }
    io::print_info("Use `help <command>` for details. Press Tab or ? to complete.");
}

pub fn print_command(entry: &CommandDefinition) {
    section(format!("Help: {}", entry.name));
    io::print_info(format!("  {}", entry.description));
    io::print_info(format!("  Usage: {}", entry.usage));
    if !entry.aliases.is_empty() {
        io::print_info(format!("  Aliases: {}", entry.aliases.join(", ")));
    }
}

pub fn print_command_usage(entry: &CommandDefinition) {
    io::print_hint(format!("usage: {}", entry.usage));
}
