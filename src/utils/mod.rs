pub mod build_info;

use std::{env, path::PathBuf, sync::Once};

use isa_config::Config;

/// Overrides the application home directory.
pub const HOME_ENV: &str = "ISA_TRACKER_HOME";

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber. Logs go to stderr so script output stays clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "isa_tracker=info".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

/// Application home: `$ISA_TRACKER_HOME`, else `~/.isa_tracker`.
pub fn app_home_dir() -> PathBuf {
    match env::var_os(HOME_ENV) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => Config::default_home(),
    }
}
