//! Writing note attachments next to the note file.

use crate::error::ResourceWriteError;
use crate::types::{Note, Resource};
use crate::vault::OutputPath;
use crate::vault::sanitize::{sanitize_file_name, split_extension, unique_name};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Where one resource ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Link relative to the note file; `None` when the payload was not written.
    pub link: Option<String>,
    pub file_name: Option<String>,
}

/// Resource identity to vault location, for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMap {
    entries: BTreeMap<String, ResourceEntry>,
}

impl ResourceMap {
    pub fn insert(&mut self, hash: impl Into<String>, entry: ResourceEntry) {
        self.entries.insert(hash.into().to_ascii_lowercase(), entry);
    }

    pub fn get(&self, hash: &str) -> Option<&ResourceEntry> {
        self.entries.get(&hash.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Outcome of extracting one note's resources.
#[derive(Debug, Default)]
pub struct Extraction {
    pub map: ResourceMap,
    pub written: usize,
    pub errors: Vec<ResourceWriteError>,
    pub warnings: Vec<String>,
}

/// File extension for a MIME type (`bin` when unknown).
pub fn mime_extension(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/heic" => "heic",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/markdown" => "md",
        "text/csv" => "csv",
        "application/json" => "json",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/amr" => "amr",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "application/zip" => "zip",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/rtf" | "text/rtf" => "rtf",
        "application/vnd.evernote.ink" => "ink",
        _ => "bin",
    }
}

/// Decide the file name of every resource, in order.
///
/// Names are unique within the note, compared case-insensitively.
pub fn plan_file_names(resources: &[Resource]) -> Vec<String> {
    let mut taken = HashSet::new();
    resources
        .iter()
        .map(|resource| {
            let candidate = candidate_name(resource);
            let (stem, ext) = split_extension(&candidate);
            unique_name(stem, ext, &mut taken)
        })
        .collect()
}

fn candidate_name(resource: &Resource) -> String {
    let ext = mime_extension(&resource.mime);
    let original = resource
        .file_name
        .as_deref()
        .map(sanitize_file_name)
        .filter(|name| !name.is_empty());

    match original {
        Some(name) if split_extension(&name).1.is_some() => name,
        Some(name) => format!("{}.{}", name, ext),
        None => format!("{}.{}", resource.hash, ext),
    }
}

/// Write a note's resources into `<stem>.resources/` under `vault_root`.
///
/// Failures are collected per resource; the note is never aborted here.
pub fn extract(note: &Note, vault_root: &Path, output: &OutputPath) -> Extraction {
    let mut extraction = Extraction::default();
    if note.resources.is_empty() {
        return extraction;
    }

    let dir = vault_root.join(output.resource_dir());
    let dir_error = std::fs::create_dir_all(&dir).err();
    let names = plan_file_names(&note.resources);

    for (resource, name) in note.resources.iter().zip(names) {
        let path = dir.join(&name);
        let result = match &dir_error {
            Some(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
            None => {
                if path.exists() {
                    log::warn!("overwriting existing file {}", path.display());
                    extraction
                        .warnings
                        .push(format!("overwrote existing file {}", path.display()));
                }
                std::fs::write(&path, &resource.data)
            }
        };

        match result {
            Ok(()) => {
                extraction.written += 1;
                extraction.map.insert(
                    resource.hash.clone(),
                    ResourceEntry {
                        link: Some(output.resource_link(&name)),
                        file_name: Some(name),
                    },
                );
            }
            Err(source) => {
                log::warn!("{}: cannot write {}: {}", note.title, path.display(), source);
                extraction.map.insert(
                    resource.hash.clone(),
                    ResourceEntry {
                        link: None,
                        file_name: Some(name.clone()),
                    },
                );
                extraction.errors.push(ResourceWriteError {
                    identity: resource.hash.clone(),
                    file_name: name,
                    source,
                });
            }
        }
    }

    extraction
}
