use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Unknown setting `{0}`")]
    UnknownKey(String),

    #[error("configuration backup `{0}` not found")]
    BackupNotFound(String),
}
