//! Error types and exit codes for evermark.
//!
//! Errors are split along the pipeline's recovery boundaries:
//! [`ArchiveError`] is fatal for a run, while [`NoteParseError`],
//! [`ResourceWriteError`] and [`VaultWriteError`] are recorded per note and
//! never escape the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const ARCHIVE_UNREADABLE: i32 = 2;
    pub const INVALID_CONFIG: i32 = 3;
}

/// The export container could not be opened or is not a well-formed ENEX export.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Export not found: {0}")]
    NotFound(PathBuf),

    #[error("No .enex documents in directory: {0}")]
    NoDocuments(PathBuf),

    #[error("Not an Evernote export (expected <en-export> root): {0}")]
    NotAnExport(PathBuf),

    #[error("Malformed export {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Cannot read export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

/// A single note could not be turned into a [`crate::types::Note`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteParseError {
    #[error("malformed note markup: {0}")]
    Malformed(String),

    #[error("markup nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("en-media element without a hash attribute")]
    MediaWithoutHash,

    #[error("body references resource {0} which is not attached to the note")]
    DanglingResource(String),

    #[error("resource #{index} has invalid base64 data: {message}")]
    InvalidResourceData { index: usize, message: String },
}

/// A resource payload could not be written to the vault.
#[derive(Error, Debug)]
#[error("cannot write resource {identity} ({file_name}): {source}")]
pub struct ResourceWriteError {
    pub identity: String,
    pub file_name: String,
    #[source]
    pub source: std::io::Error,
}

/// A note's Markdown file could not be written to the vault.
#[derive(Error, Debug)]
pub enum VaultWriteError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
}

/// Main error type for evermark operations outside the per-note boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Vault(#[from] VaultWriteError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Returns the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Archive(_) => exit_code::ARCHIVE_UNREADABLE,
            Error::Config(_) | Error::TomlParse(_) => exit_code::INVALID_CONFIG,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}

/// Result type alias for evermark operations.
pub type Result<T> = std::result::Result<T, Error>;
