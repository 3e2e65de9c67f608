//! YAML front matter for converted notes.

use crate::types::{Location, Note};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Written in place of a timestamp the export did not carry (or carried garbled).
pub const UNKNOWN_TIME: &str = "unknown";

/// Note metadata in the order it appears in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub title: String,
    pub created: String,
    pub updated: String,
    pub tags: Vec<String>,
    pub notebook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl FrontMatter {
    pub fn from_note(note: &Note, include_location: bool) -> Self {
        Self {
            title: note.title.clone(),
            created: timestamp(note.created.as_ref()),
            updated: timestamp(note.updated.as_ref()),
            tags: note.tags.iter().cloned().collect(),
            notebook: note.notebook.clone(),
            location: if include_location {
                note.attributes.location
            } else {
                None
            },
        }
    }
}

fn timestamp(value: Option<&DateTime<FixedOffset>>) -> String {
    value
        .map(DateTime::to_rfc3339)
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Serialize front matter with its `---` delimiters.
pub fn serialize_frontmatter(front: &FrontMatter) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(front)?;
    Ok(format!("---\n{}---\n", yaml))
}

/// Split a Markdown file into its raw YAML block and the content after it.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (None, content);
    };

    if let Some(pos) = rest.find("\n---\n") {
        (Some(&rest[..pos]), &rest[pos + 5..])
    } else if let Some(yaml) = rest.strip_suffix("\n---") {
        (Some(yaml), "")
    } else {
        (None, content)
    }
}
