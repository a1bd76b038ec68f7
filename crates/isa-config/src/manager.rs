use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime};

use crate::{Config, ConfigError};

const CONFIG_FILE: &str = "config.json";
const BACKUP_PREFIX: &str = "config_";
const BACKUP_SUFFIX: &str = ".json";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_LEN: usize = 15;

/// Reads, writes and snapshots the preferences file under `<home>/config`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf, backups_dir: PathBuf) -> Self {
        Self {
            config_path,
            backups_dir,
        }
    }

    /// Creates `<base>/config/backups` if needed.
    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let dir = base.join("config");
        let manager = Self::new(dir.join(CONFIG_FILE), dir.join("backups"));
        fs::create_dir_all(&manager.backups_dir)?;
        Ok(manager)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Missing file yields defaults; a present but invalid file is an error.
    pub fn load(&self) -> Result<Config, ConfigError> {
        match fs::read_to_string(&self.config_path) {
            Ok(raw) => parse_validated(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        replace_file(&self.config_path, &render(config)?)
    }

    /// Writes a snapshot of `config` and returns its file name.
    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String, ConfigError> {
        let name = backup_name(Local::now().naive_local(), note);
        replace_file(&self.backups_dir.join(&name), &render(config)?)?;
        tracing::debug!(backup = %name, "configuration snapshot written");
        Ok(name)
    }

    /// Reads a snapshot back. The live file is left untouched; callers save it.
    pub fn restore(&self, backup_name: &str) -> Result<Config, ConfigError> {
        let path = self.backups_dir.join(backup_name);
        match fs::read_to_string(&path) {
            Ok(raw) => parse_validated(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::BackupNotFound(backup_name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Snapshot file names, newest first. Files that do not follow the naming scheme sort last.
    pub fn list_backups(&self) -> Result<Vec<String>, ConfigError> {
        let listing = match fs::read_dir(&self.backups_dir) {
            Ok(listing) => listing,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut stamped: Vec<(Option<NaiveDateTime>, String)> = Vec::new();
        for entry in listing {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(BACKUP_SUFFIX) {
                stamped.push((stamp_of(&name), name));
            }
        }
        stamped.sort_by(|a, b| b.cmp(a));
        Ok(stamped.into_iter().map(|(_, name)| name).collect())
    }
}

fn parse_validated(raw: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_str(raw).map_err(|err| ConfigError::Serde(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn render(config: &Config) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(config).map_err(|err| ConfigError::Serde(err.to_string()))
}

/// `config_<stamp>[_<note-slug>].json`
fn backup_name(at: NaiveDateTime, note: Option<&str>) -> String {
    let slug = note.map(slugify).unwrap_or_default();
    let stamp = at.format(STAMP_FORMAT);
    if slug.is_empty() {
        format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}")
    } else {
        format!("{BACKUP_PREFIX}{stamp}_{slug}{BACKUP_SUFFIX}")
    }
}

/// Lowercase ASCII words joined by single dashes.
fn slugify(note: &str) -> String {
    note.split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn stamp_of(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(BACKUP_PREFIX)?.get(..STAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()
}

/// Writes to a sibling `.tmp` file and renames it over `path`.
fn replace_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
