//! Shell state, dispatch, and the argument parsers shared by commands.

use std::{io, path::PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use dialoguer::theme::ColorfulTheme;
use rust_decimal::Decimal;
use strsim::levenshtein;
use uuid::Uuid;

use isa_config::{Config, ConfigError, ConfigManager};
use isa_core::{
    AllowanceLimits, ConsistencyScoringEngine, CoreError, CurrencyFormatter, IsaBook,
    PoundFormatter, TaxYearCalendar, WizardError,
};
use isa_domain::{parse_amount, IsaType, TaxYear};
use isa_storage_json::JsonIsaStorage;

use crate::cli::commands::{self, CommandDefinition, CommandRegistry};
use crate::cli::shell::split_line;
use crate::cli::{help, io as cli_io, output};
use crate::errors::CliError;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Dialoguer(#[from] dialoguer::Error),
    #[error("Operation cancelled.")]
    Cancelled,
    #[error("exit requested")]
    ExitRequested,
}

impl From<WizardError> for CommandError {
    fn from(err: WizardError) -> Self {
        CommandError::Core(err.into())
    }
}

impl CommandError {
    pub(crate) fn usage(usage: &str) -> Self {
        CommandError::InvalidArguments(format!("usage: {usage}"))
    }
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub theme: ColorfulTheme,
    pub home: PathBuf,
    pub storage: JsonIsaStorage,
    pub config_manager: ConfigManager,
    pub config: Config,
    pub calendar: TaxYearCalendar,
    pub engine: ConsistencyScoringEngine,
    pub formatter: PoundFormatter,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        Self::with_home(mode, utils::app_home_dir())
    }

    /// Builds a shell rooted at `home`: `home/config` for settings and the configured data dir.
    pub fn with_home(mode: CliMode, home: PathBuf) -> Result<Self, CliError> {
        let config_manager = ConfigManager::with_base_dir(home.clone())?;
        let config = config_manager.load()?;
        output::set_color_enabled(config.ui_color_enabled && mode == CliMode::Interactive);
        let storage = JsonIsaStorage::new(config.resolve_data_root(&home))?;
        tracing::info!(
            home = %home.display(),
            data = %storage.data_dir().display(),
            ?mode,
            "shell ready"
        );

        Ok(ShellContext {
            mode,
            registry: CommandRegistry::new(commands::all_definitions()),
            theme: ColorfulTheme::default(),
            home,
            storage,
            config_manager,
            config,
            calendar: TaxYearCalendar::system(),
            engine: ConsistencyScoringEngine::standard(),
            formatter: PoundFormatter::new(),
            last_command: None,
            running: true,
        })
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub fn command(&self, name: &str) -> Option<&CommandDefinition> {
        self.registry.get(name)
    }

    pub fn prompt(&self) -> String {
        format!("isa {}> ", self.calendar.current().label())
    }

    pub(crate) fn greet(&self) {
        output::section(format!(
            "ISA Tracker {} ({})",
            env!("CARGO_PKG_VERSION"),
            self.calendar.current()
        ));
        cli_io::print_info("Type `help` to list commands.");
    }

    pub fn can_prompt(&self) -> bool {
        self.mode == CliMode::Interactive
    }

    pub fn limits(&self) -> AllowanceLimits {
        AllowanceLimits {
            annual: self.config.annual_allowance,
            lifetime: self.config.lifetime_allowance,
        }
    }

    pub fn money(&self, amount: Decimal) -> String {
        self.formatter.format_amount(amount)
    }

    /// Fresh snapshot of the stored book. Every command reads its own.
    pub fn load_book(&self) -> Result<IsaBook, CommandError> {
        Ok(IsaBook::load(&self.storage)?)
    }

    /// Load, change and save in one step. Nothing is written when `change` fails.
    pub fn update_book<T>(
        &self,
        change: impl FnOnce(&mut IsaBook) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let mut book = self.load_book()?;
        let result = change(&mut book)?;
        book.save(&self.storage)?;
        Ok(result)
    }

    pub fn persist_config(&self) -> CommandResult {
        self.config_manager.save(&self.config)?;
        Ok(())
    }

    /// Re-applies settings that other parts of the shell cache.
    pub(crate) fn apply_config(&mut self) -> CommandResult {
        output::set_color_enabled(self.config.ui_color_enabled && self.can_prompt());
        let data_dir = self.config.resolve_data_root(&self.home);
        if data_dir != self.storage.data_dir() {
            self.storage = JsonIsaStorage::new(data_dir)?;
            tracing::info!(data = %self.storage.data_dir().display(), "data directory changed");
        }
        Ok(())
    }

    /// Tokenizes and runs one line.
    pub fn execute(&mut self, line: &str) -> Result<LoopControl, CommandError> {
        let tokens = match split_line(line) {
            Ok(tokens) => tokens,
            Err(message) => {
                cli_io::print_warning(message);
                return Ok(LoopControl::Continue);
            }
        };
        let Some((raw, rest)) = tokens.split_first() else {
            return Ok(LoopControl::Continue);
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();
        self.last_command = Some(line.trim().to_string());

        let control = self.dispatch(&raw.to_lowercase(), raw, &args)?;
        if control == LoopControl::Exit {
            self.running = false;
        }
        Ok(control)
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.get(command).map(|entry| entry.handler) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        tracing::debug!(command, ?args, "dispatch");
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        cli_io::print_warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let needle = input.to_lowercase();
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &needle), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                cli_io::print_hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if !self.can_prompt() {
            return Ok(true);
        }
        cli_io::confirm_action(&self.theme, "Exit shell?", true)
            .map_err(|err| CliError::Command(err.to_string()))
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::Cancelled => cli_io::print_info("Operation cancelled."),
            CommandError::InvalidArguments(message) => {
                let is_usage = message.starts_with("usage:");
                cli_io::print_error(message);
                if is_usage {
                    return;
                }
                let command = self
                    .last_command
                    .as_deref()
                    .and_then(|line| line.split_whitespace().next())
                    .and_then(|name| self.command(&name.to_lowercase()));
                match command {
                    Some(entry) => help::print_command_usage(entry),
                    None => cli_io::print_hint("Use `help <command>` for usage details."),
                }
            }
            CommandError::Core(CoreError::CapacityExceeded(shortfall)) => {
                cli_io::print_error(format!(
                    "Deposit of {} exceeds the remaining capacity of {} by {}.",
                    self.money(shortfall.deposit),
                    self.money(shortfall.total_capacity),
                    self.money(shortfall.shortfall)
                ));
            }
            other => {
                tracing::debug!(error = ?other, "command failed");
                cli_io::print_error(other);
            }
        }
    }
}

/// `YYYY-MM-DD`.
pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        CommandError::InvalidArguments(format!("invalid date `{}` (use YYYY-MM-DD)", input))
    })
}

/// A user-entered date keeps the current time of day so same-day entries stay ordered.
pub(crate) fn date_at(date: NaiveDate, now: NaiveDateTime) -> NaiveDateTime {
    date.and_time(now.time())
}

/// Accepts `2024`, `2024/25`, `24/25`, `current`, `previous` and `next`.
pub(crate) fn parse_tax_year(input: &str, current: TaxYear) -> Result<TaxYear, CommandError> {
    let value = input.trim().to_ascii_lowercase();
    match value.as_str() {
        "current" | "this" => return Ok(current),
        "previous" | "last" => return Ok(current.previous()),
        "next" => return Ok(current.next()),
        _ => {}
    }
    let first = value.split(['/', '-']).next().unwrap_or_default();
    let start_year = match first.parse::<i32>() {
        Ok(year) if first.len() == 2 => 2000 + year,
        Ok(year) if first.len() == 4 => year,
        _ => {
            return Err(CommandError::InvalidArguments(format!(
                "invalid tax year `{}` (use e.g. 2024 or 2024/25)",
                input
            )))
        }
    };
    Ok(TaxYear::new(start_year))
}

pub(crate) fn parse_isa_type(input: &str) -> Result<IsaType, CommandError> {
    input
        .parse()
        .map_err(|err: isa_domain::UnknownIsaType| CommandError::InvalidArguments(err.to_string()))
}

pub(crate) fn parse_money(input: &str) -> Result<Decimal, CommandError> {
    parse_amount(input).map_err(|err| CommandError::InvalidArguments(err.to_string()))
}

pub(crate) fn short_id(id: Uuid) -> String {
    let mut short = id.simple().to_string();
    short.truncate(8);
    short
}
