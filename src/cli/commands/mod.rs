pub mod allowance;
pub mod backup;
pub mod config;
pub mod contribution;
pub mod flex;
pub mod score;
pub mod system;

use crate::cli::context::{CommandResult, ShellContext};

pub(crate) fn all_definitions() -> Vec<CommandDefinition> {
    let mut commands = Vec::new();
    commands.extend(contribution::definitions());
    commands.extend(allowance::definitions());
    commands.extend(score::definitions());
    commands.extend(flex::definitions());
    commands.extend(config::definitions());
    commands.extend(backup::definitions());
    commands.extend(system::definitions());
    commands
}

pub type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

#[derive(Clone)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: CommandHandler,
}

impl CommandDefinition {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            aliases: &[],
            description,
            usage,
            handler,
        }
    }

    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn answers_to(&self, word: &str) -> bool {
        self.name == word || self.aliases.contains(&word)
    }
}

/// Commands in registration order. Lookups match names and aliases.
pub struct CommandRegistry {
    definitions: Vec<CommandDefinition>,
}

impl CommandRegistry {
    pub fn new(definitions: Vec<CommandDefinition>) -> Self {
        Self { definitions }
    }

    pub fn get(&self, word: &str) -> Option<&CommandDefinition> {
        self.definitions.iter().find(|entry| entry.answers_to(word))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandDefinition> {
        self.definitions.iter()
    }

    /// Primary names followed by aliases; used for completion and suggestions.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        let aliases = self.definitions.iter().flat_map(|entry| entry.aliases.iter().copied());
        self.definitions.iter().map(|entry| entry.name).chain(aliases)
    }
}
