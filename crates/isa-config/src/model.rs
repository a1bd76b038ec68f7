use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Stores user-configurable preferences and the last level the user reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    #[serde(
        default = "Config::default_annual_allowance",
        with = "rust_decimal::serde::str"
    )]
    pub annual_allowance: Decimal,
    #[serde(
        default = "Config::default_lifetime_allowance",
        with = "rust_decimal::serde::str"
    )]
    pub lifetime_allowance: Decimal,
    /// Past tax years offered by `years` and the summary pickers.
    #[serde(default = "Config::default_history_years")]
    pub history_years: u32,
    #[serde(default = "Config::default_future_years")]
    pub future_years: u32,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_level: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom directory for the contribution files. Defaults to `<home>/data`.
    pub data_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-GB".into(),
            currency: "GBP".into(),
            annual_allowance: Self::default_annual_allowance(),
            lifetime_allowance: Self::default_lifetime_allowance(),
            history_years: Self::default_history_years(),
            future_years: Self::default_future_years(),
            ui_color_enabled: Self::default_ui_color_enabled(),
            last_level: None,
            data_root: None,
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 8] = [
        "locale",
        "currency",
        "annual_allowance",
        "lifetime_allowance",
        "history_years",
        "future_years",
        "ui_color_enabled",
        "data_root",
    ];

    pub fn default_annual_allowance() -> Decimal {
        Decimal::from(20_000)
    }

    pub fn default_lifetime_allowance() -> Decimal {
        Decimal::from(4_000)
    }

    pub fn default_history_years() -> u32 {
        5
    }

    pub fn default_future_years() -> u32 {
        1
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn resolve_data_root(&self, home: &Path) -> PathBuf {
        match &self.data_root {
            Some(path) => path.clone(),
            None => home.join("data"),
        }
    }

    /// Fallback home when no override is given: `~/.isa_tracker`.
    pub fn default_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".isa_tracker")
    }

    /// Checks cross-field constraints after load or edit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.annual_allowance <= Decimal::ZERO {
            return Err(invalid("annual_allowance", "must be positive"));
        }
        if self.lifetime_allowance <= Decimal::ZERO {
            return Err(invalid("lifetime_allowance", "must be positive"));
        }
        if self.lifetime_allowance > self.annual_allowance {
            return Err(invalid(
                "lifetime_allowance",
                "cannot exceed the annual allowance",
            ));
        }
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "locale" => self.locale.clone(),
            "currency" => self.currency.clone(),
            "annual_allowance" => self.annual_allowance.to_string(),
            "lifetime_allowance" => self.lifetime_allowance.to_string(),
            "history_years" => self.history_years.to_string(),
            "future_years" => self.future_years.to_string(),
            "ui_color_enabled" => self.ui_color_enabled.to_string(),
            "data_root" => self
                .data_root
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(default)".into()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// Parses and applies `value`, leaving the config untouched on failure.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        let value = value.trim();
        match key {
            "locale" => next.locale = non_empty(key, value)?,
            "currency" => next.currency = non_empty(key, value)?.to_ascii_uppercase(),
            "annual_allowance" => next.annual_allowance = parse(key, value)?,
            "lifetime_allowance" => next.lifetime_allowance = parse(key, value)?,
            "history_years" => next.history_years = parse(key, value)?,
            "future_years" => next.future_years = parse(key, value)?,
            "ui_color_enabled" => next.ui_color_enabled = parse_flag(key, value)?,
            "data_root" => {
                next.data_root = match value {
                    "" | "default" => None,
                    path => Some(PathBuf::from(path)),
                }
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    Ok(value.to_string())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("`{value}` is not a valid value")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, "expected on/off")),
    }
}
