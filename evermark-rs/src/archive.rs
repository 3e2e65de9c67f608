//! Streaming reader for Evernote `.enex` exports.
//!
//! An export is either a single `.enex` document or a directory holding one
//! document per notebook. Notes are yielded one at a time, so only a single
//! note's markup and resource data are held in memory.

use crate::error::ArchiveError;
use glob::{Pattern, glob};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// One `<note>` exactly as found in the export, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNoteRecord {
    /// Position in the export (0-indexed, across all documents).
    pub index: usize,
    /// Document the note was read from.
    pub source: PathBuf,
    /// Notebook implied by the document (directory exports only).
    pub notebook: Option<String>,
    pub title: String,
    /// ENML body markup.
    pub content: String,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub tags: Vec<String>,
    pub attributes: RawNoteAttributes,
    pub resources: Vec<RawResource>,
}

impl RawNoteRecord {
    /// Best identifying label: the title, or the note's position.
    pub fn label(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            format!("#{}", self.index + 1)
        } else {
            title.to_string()
        }
    }
}

/// Raw `<note-attributes>` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNoteAttributes {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub altitude: Option<String>,
    pub author: Option<String>,
    pub source_url: Option<String>,
}

/// Raw `<resource>` block; `data` is still base64 text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResource {
    pub data: String,
    pub mime: String,
    pub file_name: Option<String>,
}

/// One `.enex` file taking part in an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub path: PathBuf,
    /// Notebook every note of this document belongs to, when known.
    pub notebook: Option<String>,
}

/// An opened export container.
#[derive(Debug, Clone)]
pub struct Archive {
    pub root: PathBuf,
    documents: Vec<ExportDocument>,
}

impl Archive {
    /// Open an export: a single `.enex` file, or a directory of per-notebook `.enex` files.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let root = path.as_ref().to_path_buf();

        let documents = if root.is_dir() {
            list_documents(&root)?
        } else if root.is_file() {
            File::open(&root).map_err(|source| ArchiveError::Io {
                path: root.clone(),
                source,
            })?;
            vec![ExportDocument {
                path: root.clone(),
                notebook: None,
            }]
        } else {
            return Err(ArchiveError::NotFound(root));
        };

        Ok(Self { root, documents })
    }

    /// Documents that make up this export, in reading order.
    pub fn documents(&self) -> &[ExportDocument] {
        &self.documents
    }

    /// Iterate over all notes. Each call starts again from the beginning.
    pub fn records(&self) -> NoteRecords {
        NoteRecords {
            pending: self.documents.clone().into_iter(),
            current: None,
            next_index: 0,
            finished: false,
        }
    }
}

fn list_documents(dir: &Path) -> Result<Vec<ExportDocument>, ArchiveError> {
    // The directory part is matched literally.
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join("*.enex");
    let pattern_str = pattern.to_string_lossy();

    let mut paths = Vec::new();
    for entry in glob(&pattern_str)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable entry: {}", e),
        }
    }

    if paths.is_empty() {
        return Err(ArchiveError::NoDocuments(dir.to_path_buf()));
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let notebook = path
                .file_stem()
                .map(|s| s.to_string_lossy().trim().to_string())
                .filter(|s| !s.is_empty());
            ExportDocument { path, notebook }
        })
        .collect())
}

/// Lazy iterator over the notes of an [`Archive`].
///
/// Yields `Err` at most once: a container-level error ends the iteration.
pub struct NoteRecords {
    pending: std::vec::IntoIter<ExportDocument>,
    current: Option<DocumentReader>,
    next_index: usize,
    finished: bool,
}

impl Iterator for NoteRecords {
    type Item = Result<RawNoteRecord, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.current.is_none() {
                let document = self.pending.next()?;
                log::debug!("reading {}", document.path.display());
                match DocumentReader::open(document) {
                    Ok(reader) => self.current = Some(reader),
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
            }
            let reader = self.current.as_mut()?;

            match reader.next_note(self.next_index) {
                Ok(Some(record)) => {
                    self.next_index += 1;
                    return Some(Ok(record));
                }
                Ok(None) => self.current = None,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

struct DocumentReader {
    document: ExportDocument,
    reader: Reader<BufReader<File>>,
    buf: Vec<u8>,
    seen_root: bool,
}

impl DocumentReader {
    fn open(document: ExportDocument) -> Result<Self, ArchiveError> {
        let file = File::open(&document.path).map_err(|source| ArchiveError::Io {
            path: document.path.clone(),
            source,
        })?;
        let reader = Reader::from_reader(BufReader::new(file));

        Ok(Self {
            document,
            reader,
            buf: Vec::new(),
            seen_root: false,
        })
    }

    /// Read up to and including the next `</note>`.
    fn next_note(&mut self, index: usize) -> Result<Option<RawNoteRecord>, ArchiveError> {
        let path = &self.document.path;
        let mut record: Option<RawNoteRecord> = None;
        // Element names below the current <note>.
        let mut stack: Vec<String> = Vec::new();

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| malformed(path, e))?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !self.seen_root {
                        check_root(path, &name)?;
                        self.seen_root = true;
                        continue;
                    }
                    if let Some(rec) = record.as_mut() {
                        stack.push(name);
                        open_field(rec, &stack);
                    } else if name == "note" {
                        record = Some(RawNoteRecord {
                            index,
                            source: path.clone(),
                            notebook: self.document.notebook.clone(),
                            ..RawNoteRecord::default()
                        });
                        stack.clear();
                    }
                }
                Event::Empty(e) => {
                    if !self.seen_root {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        check_root(path, &name)?;
                        self.seen_root = true;
                    }
                }
                Event::End(_) => {
                    if let Some(rec) = record.as_mut() {
                        if stack.pop().is_none() {
                            let mut done = std::mem::take(rec);
                            trim_record(&mut done);
                            return Ok(Some(done));
                        }
                    }
                }
                Event::Text(e) => {
                    if let Some(rec) = record.as_mut() {
                        let text = e.unescape().map_err(|err| malformed(path, err))?;
                        push_text(rec, &stack, &text);
                    }
                }
                Event::CData(e) => {
                    if let Some(rec) = record.as_mut() {
                        push_text(rec, &stack, &String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => {
                    if record.is_some() {
                        return Err(ArchiveError::Malformed {
                            path: path.clone(),
                            message: "unexpected end of file inside <note>".to_string(),
                        });
                    }
                    if !self.seen_root {
                        return Err(ArchiveError::NotAnExport(path.clone()));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

fn malformed(path: &Path, err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Malformed {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn check_root(path: &Path, name: &str) -> Result<(), ArchiveError> {
    if name == "en-export" {
        Ok(())
    } else {
        Err(ArchiveError::NotAnExport(path.to_path_buf()))
    }
}

/// Prepare a slot for an element that repeats within a note.
fn open_field(rec: &mut RawNoteRecord, stack: &[String]) {
    let path: Vec<&str> = stack.iter().map(String::as_str).collect();
    match path.as_slice() {
        ["tag"] => rec.tags.push(String::new()),
        ["resource"] => rec.resources.push(RawResource::default()),
        _ => {}
    }
}

fn push_text(rec: &mut RawNoteRecord, stack: &[String], text: &str) {
    let path: Vec<&str> = stack.iter().map(String::as_str).collect();
    match path.as_slice() {
        ["title"] => rec.title.push_str(text),
        ["content"] => rec.content.push_str(text),
        ["created"] => append(&mut rec.created, text),
        ["updated"] => append(&mut rec.updated, text),
        ["tag"] => {
            if let Some(tag) = rec.tags.last_mut() {
                tag.push_str(text);
            }
        }
        ["note-attributes", field] => {
            let attrs = &mut rec.attributes;
            match *field {
                "latitude" => append(&mut attrs.latitude, text),
                "longitude" => append(&mut attrs.longitude, text),
                "altitude" => append(&mut attrs.altitude, text),
                "author" => append(&mut attrs.author, text),
                "source-url" => append(&mut attrs.source_url, text),
                _ => {}
            }
        }
        ["resource", field] => {
            if let Some(resource) = rec.resources.last_mut() {
                match *field {
                    "data" => resource.data.push_str(text),
                    "mime" => resource.mime.push_str(text),
                    _ => {}
                }
            }
        }
        ["resource", "resource-attributes", "file-name"] => {
            if let Some(resource) = rec.resources.last_mut() {
                append(&mut resource.file_name, text);
            }
        }
        _ => {}
    }
}

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

fn trim_record(rec: &mut RawNoteRecord) {
    fn trim_opt(slot: &mut Option<String>) {
        *slot = slot
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }

    rec.title = rec.title.trim().to_string();
    rec.content = rec.content.trim().to_string();
    trim_opt(&mut rec.created);
    trim_opt(&mut rec.updated);
    trim_opt(&mut rec.attributes.latitude);
    trim_opt(&mut rec.attributes.longitude);
    trim_opt(&mut rec.attributes.altitude);
    trim_opt(&mut rec.attributes.author);
    trim_opt(&mut rec.attributes.source_url);
    for resource in &mut rec.resources {
        resource.mime = resource.mime.trim().to_string();
        trim_opt(&mut resource.file_name);
    }
}
