//! The conversion run: archive in, vault out, one note at a time.

use crate::archive::{Archive, RawNoteRecord};
use crate::config::Config;
use crate::error::{ArchiveError, Result};
use crate::parser::{ParseOptions, parse_note};
use crate::render::render;
use crate::resources;
use crate::vault::VaultWriter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a run is, or where a note was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Reading,
    Parsing,
    Converting,
    Writing,
    Done,
}

/// A note that was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFailure {
    pub index: usize,
    pub label: String,
    pub stage: Stage,
    pub reason: String,
}

/// An attachment that was not written (its note still was).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    pub index: usize,
    pub note: String,
    pub identity: String,
    pub file_name: String,
    pub reason: String,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub notes_seen: usize,
    pub notes_converted: usize,
    pub notes_failed: Vec<NoteFailure>,
    pub resources_written: usize,
    pub resource_failures: Vec<ResourceFailure>,
    pub warnings: Vec<String>,
    /// The run was stopped before the archive was exhausted.
    pub cancelled: bool,
    /// Vault-relative paths of the written notes, in run order.
    pub written: Vec<PathBuf>,
}

impl RunSummary {
    /// True when every note and every attachment made it into the vault.
    pub fn is_clean(&self) -> bool {
        self.notes_failed.is_empty() && self.resource_failures.is_empty()
    }

    /// Fold another summary into this one, keeping failures ordered by note.
    pub fn merge(&mut self, other: RunSummary) {
        self.notes_seen += other.notes_seen;
        self.notes_converted += other.notes_converted;
        self.resources_written += other.resources_written;
        self.notes_failed.extend(other.notes_failed);
        self.notes_failed.sort_by_key(|f| f.index);
        self.resource_failures.extend(other.resource_failures);
        self.resource_failures.sort_by_key(|f| f.index);
        self.warnings.extend(other.warnings);
        self.cancelled |= other.cancelled;
        self.written.extend(other.written);
    }
}

/// Drives notes from an archive through parse, extract, render and write.
pub struct Pipeline {
    options: ParseOptions,
    writer: VaultWriter,
    stage: Stage,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: &Config, vault_root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            options: ParseOptions::from_config(config)?,
            writer: VaultWriter::new(vault_root, config)?,
            stage: Stage::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Flag that stops the run once the note in progress is finished.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Convert every note of the archive.
    ///
    /// Per-note problems end up in the summary; only a failure to read the
    /// archive itself stops the run.
    pub fn run(&mut self, archive: &Archive) -> std::result::Result<RunSummary, ArchiveError> {
        let mut summary = RunSummary::default();
        log::info!(
            "converting {} into {}",
            archive.root.display(),
            self.writer.root().display()
        );

        for record in archive.records() {
            if self.cancel.load(Ordering::Relaxed) {
                log::info!("cancelled after {} notes", summary.notes_seen);
                summary.cancelled = true;
                break;
            }
            self.stage = Stage::Reading;
            let record = record?;
            summary.notes_seen += 1;
            self.convert_note(record, &mut summary);
        }

        self.stage = Stage::Done;
        log::info!(
            "{} of {} notes converted, {} failed, {} attachments written",
            summary.notes_converted,
            summary.notes_seen,
            summary.notes_failed.len(),
            summary.resources_written
        );
        Ok(summary)
    }

    fn convert_note(&mut self, record: RawNoteRecord, summary: &mut RunSummary) {
        let index = record.index;
        let label = record.label();
        log::debug!("note {}: {}", index + 1, label);

        self.stage = Stage::Parsing;
        let note = match parse_note(record, &self.options) {
            Ok(note) => note,
            Err(e) => {
                self.fail(summary, index, &label, e.to_string());
                return;
            }
        };

        self.stage = Stage::Converting;
        let output = self.writer.allocate(&note);
        let extraction = resources::extract(&note, self.writer.root(), &output);
        summary.resources_written += extraction.written;
        summary.warnings.extend(extraction.warnings);
        for error in extraction.errors {
            summary.resource_failures.push(ResourceFailure {
                index,
                note: label.clone(),
                identity: error.identity.clone(),
                file_name: error.file_name.clone(),
                reason: error.source.to_string(),
            });
        }
        let body = render(&note.body, &extraction.map);

        self.stage = Stage::Writing;
        match self.writer.write(&output, &note, &body) {
            Ok(written) => {
                if written.replaced {
                    summary
                        .warnings
                        .push(format!("overwrote existing file {}", written.path.display()));
                }
                summary.notes_converted += 1;
                summary.written.push(output.note_file());
            }
            Err(e) => self.fail(summary, index, &label, e.to_string()),
        }
    }

    fn fail(&self, summary: &mut RunSummary, index: usize, label: &str, reason: String) {
        log::warn!("{}: skipped while {:?}: {}", label, self.stage, reason);
        summary.notes_failed.push(NoteFailure {
            index,
            label: label.to_string(),
            stage: self.stage,
            reason,
        });
    }
}

/// Convert an export (file or directory of `.enex` files) into a vault.
pub fn convert(input: &Path, vault_root: &Path, config: &Config) -> Result<RunSummary> {
    let archive = Archive::open(input)?;
    let mut pipeline = Pipeline::new(config, vault_root)?;
    Ok(pipeline.run(&archive)?)
}
