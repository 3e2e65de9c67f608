//! Shared types for evermark.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One exported note, fully parsed.
#[derive(Debug, Clone)]
pub struct Note {
    /// Position of the note in the export (0-indexed, across all documents).
    pub index: usize,

    /// Note title (never empty).
    pub title: String,

    /// Creation time in the configured zone, `None` when unknown.
    pub created: Option<DateTime<FixedOffset>>,

    /// Last update time in the configured zone, `None` when unknown.
    pub updated: Option<DateTime<FixedOffset>>,

    /// Tags (order-irrelevant, kept sorted).
    pub tags: BTreeSet<String>,

    /// Notebook name (never empty).
    pub notebook: String,

    /// Parsed body.
    pub body: Document,

    /// Embedded attachments in export order.
    pub resources: Vec<Resource>,

    /// Optional note attributes.
    pub attributes: NoteAttributes,
}

impl Note {
    /// Label used to identify this note in run summaries.
    pub fn label(&self) -> String {
        self.title.clone()
    }

    /// Find a resource by its identity (case-insensitive).
    pub fn resource(&self, hash: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.hash.eq_ignore_ascii_case(hash))
    }
}

/// Extra attributes Evernote keeps per note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteAttributes {
    pub location: Option<Location>,
    pub author: Option<String>,
    pub source_url: Option<String>,
}

/// Where a note was written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// One embedded binary attachment.
#[derive(Clone)]
pub struct Resource {
    /// Lowercase hex MD5 of the payload; what `<en-media hash>` refers to.
    pub hash: String,

    /// Declared MIME type.
    pub mime: String,

    /// Original file name, if the export recorded one.
    pub file_name: Option<String>,

    /// Decoded payload.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("hash", &self.hash)
            .field("mime", &self.mime)
            .field("file_name", &self.file_name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Normalized document tree of a note body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// All resource identities referenced from the body, in document order.
    pub fn resource_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        for node in &self.children {
            node.collect_resource_refs(&mut refs);
        }
        refs
    }

    /// Concatenated text content of the whole document.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            node.push_text_content(&mut out);
        }
        out
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
    ResourceRef { hash: String, alt: Option<String> },
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(Element {
            kind,
            attributes: BTreeMap::new(),
            children,
        })
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Text content of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text_content(&mut out);
        out
    }

    fn push_text_content(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in &el.children {
                    child.push_text_content(out);
                }
            }
            Node::ResourceRef { .. } => {}
        }
    }

    fn collect_resource_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Node::ResourceRef { hash, .. } => refs.push(hash),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_resource_refs(refs);
                }
            }
            Node::Text(_) => {}
        }
    }
}

/// An element with its classified kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// The fixed set of element kinds the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Paragraph,
    Heading(u8),
    List { ordered: bool },
    ListItem,
    Table,
    TableRow,
    TableCell { header: bool },
    Emphasis,
    Strong,
    Strikethrough,
    Code,
    CodeBlock,
    /// `href` lives in the attributes.
    Link,
    /// `src` and `alt` live in the attributes.
    Image,
    LineBreak,
    Blockquote,
    Rule,
    Checkbox { checked: bool },
}

impl ElementKind {
    /// Whether this kind starts a new block in the rendered output.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            ElementKind::Paragraph
                | ElementKind::Heading(_)
                | ElementKind::List { .. }
                | ElementKind::ListItem
                | ElementKind::Table
                | ElementKind::TableRow
                | ElementKind::TableCell { .. }
                | ElementKind::CodeBlock
                | ElementKind::Blockquote
                | ElementKind::Rule
        )
    }
}
