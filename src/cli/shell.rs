use std::{
    borrow::Cow,
    io::{self, BufRead},
};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::{ValidationContext, ValidationResult, Validator},
    Cmd, Context as ReadlineContext, Editor, Helper, KeyEvent,
};

use isa_domain::IsaType;

use crate::cli::context::{CliMode, LoopControl, ShellContext};
use crate::cli::output;
use crate::errors::CliError;

/// Set to any value to read commands from stdin without prompts.
pub const SCRIPT_ENV: &str = "ISA_TRACKER_CLI_SCRIPT";

/// Commands whose third argument is an ISA type: `<cmd> <provider> <type> ...`.
const TYPED_COMMANDS: [&str; 3] = ["add", "withdraw", "check"];

const SUBCOMMANDS: [(&str, &[&str]); 4] = [
    ("flex", &["show", "set", "clear"]),
    ("config", &["show", "get", "set", "backup", "backups", "restore"]),
    ("backup", &["list", "create", "restore"]),
    ("delete", &["--withdrawn", "--undo"]),
];

pub fn run_cli() -> Result<(), CliError> {
    let mode = if std::env::var_os(SCRIPT_ENV).is_some() {
        CliMode::Script
    } else {
        CliMode::Interactive
    };
    let mut context = ShellContext::new(mode)?;
    match mode {
        CliMode::Interactive => run_interactive(&mut context),
        CliMode::Script => run_script(&mut context),
    }
}

fn run_interactive(context: &mut ShellContext) -> Result<(), CliError> {
    let mut editor = Editor::<ShellHelper, DefaultHistory>::new()?;
    editor.set_helper(Some(ShellHelper::new(context.command_names())));
    editor.bind_sequence(KeyEvent::from('?'), Cmd::Complete);
    context.greet();

    while context.running {
        match editor.readline(&context.prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    editor.add_history_entry(line.trim()).ok();
                }
                if run_line(context, &line) == LoopControl::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                if context.confirm_exit()? {
                    break;
                }
            }
            Err(ReadlineError::Eof) => {
                output::info("Exiting shell.");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Reads one command per line. Blank lines and `#` comments are skipped.
fn run_script(context: &mut ShellContext) -> Result<(), CliError> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim_start().starts_with('#') {
            continue;
        }
        if run_line(context, &line) == LoopControl::Exit || !context.running {
            break;
        }
    }
    Ok(())
}

/// Failed commands are reported and the session carries on.
fn run_line(context: &mut ShellContext, line: &str) -> LoopControl {
    let line = line.trim();
    if line.is_empty() {
        return LoopControl::Continue;
    }
    match context.execute(line) {
        Ok(control) => control,
        Err(err) => {
            context.report_error(err);
            LoopControl::Continue
        }
    }
}

/// Completes command names, their subcommands and ISA type keys.
struct ShellHelper {
    commands: Vec<String>,
}

impl ShellHelper {
    fn new(names: Vec<&'static str>) -> Self {
        let mut commands: Vec<String> = names.into_iter().map(str::to_string).collect();
        commands.sort();
        Self { commands }
    }

    fn candidates(&self, words: &[&str], position: usize) -> Vec<String> {
        if position == 0 {
            return self.commands.clone();
        }
        let command = words.first().map(|word| word.to_ascii_lowercase());
        let command = command.as_deref().unwrap_or_default();
        if position == 2 && TYPED_COMMANDS.contains(&command) {
            return IsaType::ALL.iter().map(|kind| kind.key().to_string()).collect();
        }
        if position == 1 && command == "help" {
            return self.commands.clone();
        }
        if position == 1 {
            if let Some((_, subcommands)) = SUBCOMMANDS.iter().find(|(name, _)| *name == command)
            {
                return subcommands.iter().map(|sub| sub.to_string()).collect();
            }
        }
        if command == "flex" && position == 3 {
            return IsaType::ALL
                .iter()
                .filter(|kind| kind.can_be_flexible())
                .map(|kind| kind.key().to_string())
                .collect();
        }
        Vec::new()
    }
}

impl Helper for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let start = prefix
            .rfind(char::is_whitespace)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let words: Vec<&str> = prefix[..start].split_whitespace().collect();
        let needle = prefix[start..].to_ascii_lowercase();
        let matches = self
            .candidates(&words, words.len())
            .into_iter()
            .filter(|candidate| candidate.starts_with(&needle))
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for ShellHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

/// Splits a command line with shell quoting rules.
pub(crate) fn split_line(input: &str) -> Result<Vec<String>, String> {
    shell_words::split(input).map_err(|err| format!("could not parse line: {err}"))
}
