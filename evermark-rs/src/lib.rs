//! Evermark - convert Evernote exports (`.enex`) into a Markdown vault.
//!
//! # Overview
//!
//! A run streams notes out of an export, one at a time:
//! - [`archive`] reads `<note>` records lazily from one or more ENEX files
//! - [`parser`] turns a record into a [`Note`] with a normalized body tree
//! - [`resources`] writes attachments next to the note file
//! - [`render`] produces Markdown, delegating inline styling to an
//!   [`render::InlineFormatter`]
//! - [`vault`] picks collision-free paths and writes front matter + body
//! - [`pipeline`] drives the above and collects a [`RunSummary`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use evermark::{Config, convert};
//!
//! let summary = convert(Path::new("export.enex"), Path::new("vault"), &Config::default()).unwrap();
//! println!("{} notes written", summary.notes_converted);
//! for failure in &summary.notes_failed {
//!     println!("{}: {}", failure.label, failure.reason);
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod resources;
pub mod types;
pub mod vault;

// Re-export main types at crate root
pub use archive::Archive;
pub use config::{Config, Layout};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunSummary, convert};
pub use types::*;
pub use vault::VaultWriter;
