//! Conversion settings, loaded from `config.toml` and overridden by CLI flags.

use crate::error::{Error, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How notes are distributed over directories in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `<notebook>/<title>.md`
    #[default]
    Notebook,
    /// `<YYYY>/<MM>/<DD>/<title>.md`, by creation date.
    Daily,
}

/// Conversion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Notebook used for notes that carry none.
    pub default_notebook: String,
    /// Title used for notes with an empty title.
    pub untitled_title: String,
    pub layout: Layout,
    /// Fixed zone all timestamps are normalized to, as `+HH:MM`.
    pub utc_offset: String,
    /// Emit a `location` mapping in front matter when the note has one.
    pub include_location: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_notebook: "Unfiled".to_string(),
            untitled_title: "Untitled".to_string(),
            layout: Layout::Notebook,
            utc_offset: "+00:00".to_string(),
            include_location: false,
        }
    }
}

impl Config {
    /// Default location of the user config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("evermark").join("config.toml"))
    }

    /// Load the user config file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.zone()?;
        if self.default_notebook.trim().is_empty() {
            return Err(Error::Config("default_notebook must not be empty".to_string()));
        }
        if self.untitled_title.trim().is_empty() {
            return Err(Error::Config("untitled_title must not be empty".to_string()));
        }
        Ok(())
    }

    /// The fixed zone timestamps are converted to.
    pub fn zone(&self) -> Result<FixedOffset> {
        self.utc_offset
            .trim()
            .parse::<FixedOffset>()
            .map_err(|e| Error::Config(format!("invalid utc_offset '{}': {}", self.utc_offset, e)))
    }
}
