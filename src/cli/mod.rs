pub mod commands;
pub mod context;
mod help;
pub mod io;
pub mod output;
mod shell;

pub use context::{CliMode, ShellContext};
pub use shell::run_cli;
