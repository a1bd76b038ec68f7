use std::{
    cmp::Reverse,
    fmt,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{Local, NaiveDateTime};
use serde::{de::DeserializeOwned, Serialize};

use isa_core::{
    storage::{BackupInfo, ContributionStore, FlexibilityStore, WithdrawalStore},
    CoreError,
};
use isa_domain::{Contribution, FlexibilitySettings, Withdrawal};

const EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const BACKUP_TIMESTAMP_LEN: usize = 15;
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TMP_SUFFIX: &str = "tmp";
const BACKUPS_DIR: &str = "backups";
pub const DEFAULT_RETENTION: usize = 5;

/// The three files that make up a book on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Contributions,
    Withdrawals,
    Flexibility,
}

impl Document {
    pub const ALL: [Document; 3] = [
        Document::Contributions,
        Document::Withdrawals,
        Document::Flexibility,
    ];

    pub fn stem(self) -> &'static str {
        match self {
            Document::Contributions => "contributions",
            Document::Withdrawals => "withdrawals",
            Document::Flexibility => "flexibility",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.{}", self.stem(), EXTENSION)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

impl FromStr for Document {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Document::ALL
            .into_iter()
            .find(|doc| doc.stem().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "unknown document `{}` (expected contributions, withdrawals or flexibility)",
                    value.trim()
                ))
            })
    }
}

/// Filesystem-backed JSON persistence for the contribution book and its backups.
#[derive(Debug, Clone)]
pub struct JsonIsaStorage {
    data_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonIsaStorage {
    pub fn new(data_dir: PathBuf) -> Result<Self, CoreError> {
        Self::with_retention(data_dir, DEFAULT_RETENTION)
    }

    pub fn with_retention(data_dir: PathBuf, retention: usize) -> Result<Self, CoreError> {
        let backups_dir = data_dir.join(BACKUPS_DIR);
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&backups_dir)?;
        Ok(Self {
            data_dir,
            backups_dir,
            retention: retention.max(1),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn document_path(&self, document: Document) -> PathBuf {
        self.data_dir.join(document.file_name())
    }

    pub fn backup_path(&self, document: Document, backup: &str) -> PathBuf {
        self.backup_dir(document).join(backup)
    }

    /// Copies the current file into the backup folder, optionally tagged with a note.
    pub fn backup_document(
        &self,
        document: Document,
        note: Option<&str>,
    ) -> Result<Option<BackupInfo>, CoreError> {
        let path = self.document_path(document);
        if !path.exists() {
            return Ok(None);
        }
        let dir = self.backup_dir(document);
        fs::create_dir_all(&dir)?;
        let now = Local::now();
        let timestamp = now.format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let label = sanitize_note(note);
        // Saves within the same second get `-1`, `-2`, ... after the stamp.
        let file_name = (0u32..)
            .map(|sequence| backup_file_name(document, &timestamp, sequence, label.as_deref()))
            .find(|name| !dir.join(name).exists())
            .unwrap_or_default();
        let backup_path = dir.join(&file_name);
        fs::copy(&path, &backup_path)?;
        tracing::debug!(document = %document, backup = %file_name, "backup written");
        self.prune_backups(document)?;
        Ok(Some(BackupInfo {
            document: document.stem().to_string(),
            id: file_name,
            created_at: now.format(CREATED_AT_FORMAT).to_string(),
            path: backup_path,
        }))
    }

    /// Backups for `document`, newest first.
    pub fn list_backups(&self, document: Document) -> Result<Vec<BackupInfo>, CoreError> {
        let dir = self.backup_dir(document);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(created) = parse_backup_timestamp(document, file_name) else {
                continue;
            };
            entries.push(BackupInfo {
                document: document.stem().to_string(),
                id: file_name.to_string(),
                created_at: created.format(CREATED_AT_FORMAT).to_string(),
                path: path.clone(),
            });
        }
        entries.sort_by_key(|info| {
            Reverse((
                parse_backup_timestamp(document, &info.id),
                backup_sequence(document, &info.id),
            ))
        });
        Ok(entries)
    }

    /// Replaces the live document with a backup after checking the backup parses.
    ///
    /// The file being replaced is itself backed up first.
    pub fn restore_backup(
        &self,
        document: Document,
        backup: &BackupInfo,
    ) -> Result<(), CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!("backup `{}` not found", backup.id)));
        }
        let data = fs::read_to_string(&backup.path)?;
        match document {
            Document::Contributions => validate::<Vec<Contribution>>(&data)?,
            Document::Withdrawals => validate::<Vec<Withdrawal>>(&data)?,
            Document::Flexibility => validate::<FlexibilitySettings>(&data)?,
        }
        let target = self.document_path(document);
        self.backup_document(document, Some("pre-restore"))?;
        replace_file(&target, &data)?;
        tracing::info!(document = %document, backup = %backup.id, "backup restored");
        Ok(())
    }

    fn backup_dir(&self, document: Document) -> PathBuf {
        self.backups_dir.join(document.stem())
    }

    fn prune_backups(&self, document: Document) -> Result<(), CoreError> {
        let entries = self.list_backups(document)?;
        for entry in entries.into_iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(&entry.path) {
                tracing::warn!(backup = %entry.id, %err, "could not prune backup");
            }
        }
        Ok(())
    }

    fn load_document<T>(&self, document: Document) -> Result<T, CoreError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.document_path(document);
        if !path.exists() {
            return Ok(T::default());
        }
        load_from_path(&path)
    }

    fn save_document<T>(&self, document: Document, value: &T) -> Result<(), CoreError>
    where
        T: Serialize + ?Sized,
    {
        let data = serialize(value)?;
        let path = self.document_path(document);
        if fs::read_to_string(&path).is_ok_and(|current| current == data) {
            return Ok(());
        }
        self.backup_document(document, None)?;
        replace_file(&path, &data)
    }
}

impl ContributionStore for JsonIsaStorage {
    fn load_contributions(&self) -> Result<Vec<Contribution>, CoreError> {
        self.load_document(Document::Contributions)
    }

    fn save_contributions(&self, contributions: &[Contribution]) -> Result<(), CoreError> {
        self.save_document(Document::Contributions, contributions)
    }
}

impl WithdrawalStore for JsonIsaStorage {
    fn load_withdrawals(&self) -> Result<Vec<Withdrawal>, CoreError> {
        self.load_document(Document::Withdrawals)
    }

    fn save_withdrawals(&self, withdrawals: &[Withdrawal]) -> Result<(), CoreError> {
        self.save_document(Document::Withdrawals, withdrawals)
    }
}

impl FlexibilityStore for JsonIsaStorage {
    fn load_flexibility(&self) -> Result<FlexibilitySettings, CoreError> {
        self.load_document(Document::Flexibility)
    }

    fn save_flexibility(&self, settings: &FlexibilitySettings) -> Result<(), CoreError> {
        self.save_document(Document::Flexibility, settings)
    }
}

/// Reads and decodes a JSON document from an arbitrary path.
pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|err| CoreError::Serde(format!("{}: {}", path.display(), err)))
}

fn validate<T: DeserializeOwned>(data: &str) -> Result<(), CoreError> {
    serde_json::from_str::<T>(data)
        .map(|_| ())
        .map_err(|err| CoreError::Serde(err.to_string()))
}

fn replace_file(path: &Path, data: &str) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_file(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn sanitize_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !sanitized.is_empty() && !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads `<stem>_YYYYMMDD_HHMMSS[_note].json`.
/// `<stem>_<stamp>[-<sequence>][_<note>].json`
fn backup_file_name(
    document: Document,
    timestamp: &str,
    sequence: u32,
    label: Option<&str>,
) -> String {
    let mut name = format!("{}_{}", document.stem(), timestamp);
    if sequence > 0 {
        name.push_str(&format!("-{sequence}"));
    }
    if let Some(label) = label {
        name.push('_');
        name.push_str(label);
    }
    format!("{}.{}", name, EXTENSION)
}

fn stamped_part<'a>(document: Document, name: &'a str) -> Option<&'a str> {
    name.strip_suffix(&format!(".{}", EXTENSION))?
        .strip_prefix(document.stem())?
        .strip_prefix('_')
}

fn parse_backup_timestamp(document: Document, name: &str) -> Option<NaiveDateTime> {
    let raw = stamped_part(document, name)?.get(..BACKUP_TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(raw, BACKUP_TIMESTAMP_FORMAT).ok()
}

/// 0 for the first backup taken in a given second.
fn backup_sequence(document: Document, name: &str) -> u32 {
    stamped_part(document, name)
        .and_then(|rest| rest.get(BACKUP_TIMESTAMP_LEN..))
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .unwrap_or(0)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|err| CoreError::Serde(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backup_names_with_and_without_notes() {
        let doc = Document::Contributions;
        let plain = parse_backup_timestamp(doc, "contributions_20240501_093000.json");
        assert!(plain.is_some());
        let noted = parse_backup_timestamp(doc, "contributions_20240501_093000_pre-restore.json");
        assert_eq!(noted, plain);
        let other = "contributions_20240501_093000.json";
        assert!(parse_backup_timestamp(Document::Withdrawals, other).is_none());
        assert!(parse_backup_timestamp(doc, "contributions_latest.json").is_none());
    }

    #[test]
    fn same_second_backups_are_numbered() {
        let doc = Document::Withdrawals;
        let first = backup_file_name(doc, "20240501_093000", 0, None);
        let second = backup_file_name(doc, "20240501_093000", 2, Some("pre-restore"));
        assert_eq!(first, "withdrawals_20240501_093000.json");
        assert_eq!(second, "withdrawals_20240501_093000-2_pre-restore.json");
        assert_eq!(backup_sequence(doc, &first), 0);
        assert_eq!(backup_sequence(doc, &second), 2);
        assert_eq!(
            parse_backup_timestamp(doc, &second),
            parse_backup_timestamp(doc, &first)
        );
    }

    #[test]
    fn notes_are_slugged() {
        assert_eq!(sanitize_note(Some("Before Import!")), Some("before-import".into()));
        assert_eq!(sanitize_note(Some("  ")), None);
        assert_eq!(sanitize_note(None), None);
    }

    #[test]
    fn document_names_parse_case_insensitively() {
        assert_eq!("Flexibility".parse::<Document>().unwrap(), Document::Flexibility);
        assert!("ledger".parse::<Document>().is_err());
    }
}
