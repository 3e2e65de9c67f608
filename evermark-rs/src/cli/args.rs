//! CLI argument definitions using clap.

use crate::config::{Config, Layout};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "evermark")]
#[command(author, version, about = "Convert Evernote exports into a Markdown vault", long_about = None)]
pub struct Cli {
    /// ENEX file, or a directory of .enex files (one per notebook)
    pub input: PathBuf,

    /// Vault directory to write into (created if missing)
    pub output: PathBuf,

    /// Config file (defaults to <config dir>/evermark/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How notes are laid out in the vault
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Notebook for notes that have none
    #[arg(long)]
    pub default_notebook: Option<String>,

    /// Fixed UTC offset timestamps are written in, e.g. +02:00
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<String>,

    /// Add the note's location to front matter
    #[arg(long)]
    pub include_location: bool,

    /// Output as JSON (default)
    #[arg(long, conflicts_with_all = ["yaml", "toml"])]
    pub json: bool,

    /// Output as YAML
    #[arg(long, conflicts_with_all = ["json", "toml"])]
    pub yaml: bool,

    /// Output as TOML
    #[arg(long, conflicts_with_all = ["json", "yaml"])]
    pub toml: bool,

    /// Suppress logging and the run summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.yaml {
            OutputFormat::Yaml
        } else if self.toml {
            OutputFormat::Toml
        } else {
            OutputFormat::Json
        }
    }

    /// Flags given on the command line win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(notebook) = &self.default_notebook {
            config.default_notebook = notebook.clone();
        }
        if let Some(offset) = &self.utc_offset {
            config.utc_offset = offset.clone();
        }
        if self.include_location {
            config.include_location = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Toml,
}
