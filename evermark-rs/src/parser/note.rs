//! Turning a raw ENEX record into a [`Note`].

use crate::archive::{RawNoteAttributes, RawNoteRecord, RawResource};
use crate::config::Config;
use crate::error::{NoteParseError, Result};
use crate::parser::enml::parse_enml;
use crate::types::{Location, Note, NoteAttributes, Resource};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use std::collections::BTreeSet;

/// MIME type assumed when a resource declares none.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Defaults applied while parsing notes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub default_notebook: String,
    pub untitled_title: String,
    /// Zone all timestamps are converted to.
    pub zone: FixedOffset,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_notebook: "Unfiled".to_string(),
            untitled_title: "Untitled".to_string(),
            zone: Utc.fix(),
        }
    }
}

impl ParseOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            default_notebook: config.default_notebook.trim().to_string(),
            untitled_title: config.untitled_title.trim().to_string(),
            zone: config.zone()?,
        })
    }
}

/// Parse one raw record into a note.
///
/// Bad timestamps degrade to "unknown"; malformed markup, undecodable
/// resource data and references to missing resources fail the note.
pub fn parse_note(record: RawNoteRecord, options: &ParseOptions) -> std::result::Result<Note, NoteParseError> {
    let title = match record.title.trim() {
        "" => options.untitled_title.clone(),
        title => title.to_string(),
    };

    let created = parse_field_timestamp(&title, "created", record.created.as_deref(), &options.zone);
    let updated = parse_field_timestamp(&title, "updated", record.updated.as_deref(), &options.zone);

    let tags: BTreeSet<String> = record
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let notebook = record
        .notebook
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&options.default_notebook)
        .to_string();

    let resources = decode_resources(record.resources)?;

    let body = parse_enml(&record.content)?;
    for hash in body.resource_refs() {
        if !resources.iter().any(|r| r.hash.eq_ignore_ascii_case(hash)) {
            return Err(NoteParseError::DanglingResource(hash.to_string()));
        }
    }

    Ok(Note {
        index: record.index,
        title,
        created,
        updated,
        tags,
        notebook,
        body,
        resources,
        attributes: parse_attributes(&record.attributes),
    })
}

fn parse_field_timestamp(
    title: &str,
    field: &str,
    raw: Option<&str>,
    zone: &FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw, zone);
    if parsed.is_none() {
        log::warn!("{}: unreadable {} timestamp '{}', leaving it unknown", title, field, raw);
    }
    parsed
}

/// Parse an ENEX timestamp (`20231231T235959Z` or `20231231T235959+0100`).
pub fn parse_timestamp(raw: &str, zone: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Some(utc) = raw.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| dt.and_utc().with_timezone(zone));
    }
    DateTime::parse_from_str(raw, "%Y%m%dT%H%M%S%z")
        .ok()
        .map(|dt| dt.with_timezone(zone))
}

fn decode_resources(raw: Vec<RawResource>) -> std::result::Result<Vec<Resource>, NoteParseError> {
    let mut resources: Vec<Resource> = Vec::with_capacity(raw.len());

    for (index, resource) in raw.into_iter().enumerate() {
        let cleaned: String = resource
            .data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let data = BASE64
            .decode(cleaned.as_bytes())
            .map_err(|e| NoteParseError::InvalidResourceData {
                index,
                message: e.to_string(),
            })?;

        let hash = format!("{:x}", md5::compute(&data));
        if resources.iter().any(|r| r.hash == hash) {
            log::debug!("dropping duplicate resource {}", hash);
            continue;
        }

        let mime = match resource.mime.trim() {
            "" => DEFAULT_MIME.to_string(),
            mime => mime.to_ascii_lowercase(),
        };

        resources.push(Resource {
            hash,
            mime,
            file_name: resource.file_name,
            data,
        });
    }

    Ok(resources)
}

fn parse_attributes(raw: &RawNoteAttributes) -> NoteAttributes {
    let coord = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok());

    let location = match (coord(&raw.latitude), coord(&raw.longitude)) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
            altitude: coord(&raw.altitude),
        }),
        _ => None,
    };

    NoteAttributes {
        location,
        author: raw.author.clone(),
        source_url: raw.source_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn record(content: &str) -> RawNoteRecord {
        RawNoteRecord {
            index: 4,
            title: "Sample".to_string(),
            content: content.to_string(),
            ..RawNoteRecord::default()
        }
    }

    fn resource(data: &[u8], mime: &str) -> RawResource {
        RawResource {
            data: BASE64.encode(data),
            mime: mime.to_string(),
            file_name: None,
        }
    }

    #[test]
    fn test_parse_utc_timestamp() {
        let dt = parse_timestamp("20231231T235959Z", &Utc.fix()).unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month(), 12);
        assert_eq!(dt.day(), 31);
        assert_eq!(dt.hour(), 23);
    }

    #[test]
    fn test_parse_timestamp_with_offset_normalized() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let dt = parse_timestamp("20240101T120000+0000", &zone).unwrap();
        assert_eq!(dt.hour(), 13);
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_bad_timestamp_is_unknown() {
        assert!(parse_timestamp("yesterday", &Utc.fix()).is_none());

        let mut rec = record("<en-note/>");
        rec.created = Some("not a date".to_string());
        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert!(note.created.is_none());
    }

    #[test]
    fn test_defaults_applied() {
        let mut rec = record("<en-note/>");
        rec.title = "   ".to_string();
        rec.notebook = Some(" ".to_string());
        rec.tags = vec![" b ".to_string(), "a".to_string(), "".to_string(), "a".to_string()];

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert_eq!(note.title, "Untitled");
        assert_eq!(note.notebook, "Unfiled");
        assert_eq!(note.tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(note.index, 4);
    }

    #[test]
    fn test_resource_identity_is_md5() {
        let mut rec = record("<en-note/>");
        rec.resources = vec![resource(b"hello", "IMAGE/PNG")];

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert_eq!(note.resources.len(), 1);
        assert_eq!(note.resources[0].hash, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(note.resources[0].mime, "image/png");
        assert_eq!(note.resources[0].data, b"hello");
    }

    #[test]
    fn test_multiline_base64_decoded() {
        let mut rec = record("<en-note/>");
        rec.resources = vec![RawResource {
            data: "\n  aGVs\n  bG8=\n".to_string(),
            mime: String::new(),
            file_name: None,
        }];

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert_eq!(note.resources[0].data, b"hello");
        assert_eq!(note.resources[0].mime, DEFAULT_MIME);
    }

    #[test]
    fn test_duplicate_payload_kept_once() {
        let mut rec = record("<en-note/>");
        rec.resources = vec![resource(b"same", "image/png"), resource(b"same", "image/png")];

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert_eq!(note.resources.len(), 1);
    }

    #[test]
    fn test_invalid_base64_fails() {
        let mut rec = record("<en-note/>");
        rec.resources = vec![RawResource {
            data: "!!!not base64!!!".to_string(),
            mime: "image/png".to_string(),
            file_name: None,
        }];

        let result = parse_note(rec, &ParseOptions::default());
        assert!(matches!(
            result,
            Err(NoteParseError::InvalidResourceData { index: 0, .. })
        ));
    }

    #[test]
    fn test_resolved_reference() {
        let hash = format!("{:x}", md5::compute(b"png bytes"));
        let mut rec = record(&format!(
            r#"<en-note><en-media type="image/png" hash="{}"/></en-note>"#,
            hash.to_uppercase()
        ));
        rec.resources = vec![resource(b"png bytes", "image/png")];

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        assert_eq!(note.body.resource_refs(), vec![hash.as_str()]);
        assert!(note.resource(&hash).is_some());
    }

    #[test]
    fn test_dangling_reference_fails() {
        let rec = record(r#"<en-note><en-media type="image/png" hash="deadbeef"/></en-note>"#);
        let result = parse_note(rec, &ParseOptions::default());
        assert_eq!(
            result.unwrap_err(),
            NoteParseError::DanglingResource("deadbeef".to_string())
        );
    }

    #[test]
    fn test_location_attributes() {
        let mut rec = record("<en-note/>");
        rec.attributes.latitude = Some("51.5".to_string());
        rec.attributes.longitude = Some("-0.12".to_string());

        let note = parse_note(rec, &ParseOptions::default()).unwrap();
        let location = note.attributes.location.unwrap();
        assert_eq!(location.latitude, 51.5);
        assert_eq!(location.altitude, None);
    }
}
