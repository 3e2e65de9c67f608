//! ENML body parsing into a normalized [`Document`].

use crate::error::NoteParseError;
use crate::types::{Document, Element, ElementKind, Node};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Deepest element nesting accepted before the markup is rejected.
pub const MAX_DEPTH: usize = 256;

/// Text emitted in place of an `<en-crypt>` block.
pub const ENCRYPTED_PLACEHOLDER: &str = "[encrypted content]";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\n\x0C]+").unwrap());

// Evernote marks code blocks as <div style="-en-codeblock: true; ...">
static CODEBLOCK_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-en-codeblock\s*:\s*true").unwrap());

/// How an element is handled once it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Element(ElementKind),
    /// Children are spliced into the parent.
    Transparent,
    /// `<en-media>`: becomes a resource reference.
    Media,
    Encrypted,
    /// Dropped along with its content.
    Drop,
    /// Reduced to its text content.
    Unknown,
}

fn classify(tag: &str, attributes: &BTreeMap<String, String>) -> Class {
    use ElementKind::*;

    match tag {
        "div" => {
            let codeblock = attributes
                .get("style")
                .is_some_and(|style| CODEBLOCK_STYLE.is_match(style));
            if codeblock {
                Class::Element(CodeBlock)
            } else {
                Class::Element(Paragraph)
            }
        }
        "p" => Class::Element(Paragraph),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse().unwrap_or(1);
            Class::Element(Heading(level))
        }
        "ul" => Class::Element(List { ordered: false }),
        "ol" => Class::Element(List { ordered: true }),
        "li" => Class::Element(ListItem),
        "table" => Class::Element(Table),
        "tr" => Class::Element(TableRow),
        "td" => Class::Element(TableCell { header: false }),
        "th" => Class::Element(TableCell { header: true }),
        "i" | "em" => Class::Element(Emphasis),
        "b" | "strong" => Class::Element(Strong),
        "s" | "strike" | "del" => Class::Element(Strikethrough),
        "code" | "tt" | "kbd" | "samp" | "var" => Class::Element(Code),
        "pre" => Class::Element(CodeBlock),
        "a" => Class::Element(Link),
        "img" => Class::Element(Image),
        "br" => Class::Element(LineBreak),
        "blockquote" => Class::Element(Blockquote),
        "hr" => Class::Element(Rule),
        "en-todo" => {
            let checked = attributes
                .get("checked")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
            Class::Element(Checkbox { checked })
        }
        "en-media" => Class::Media,
        "en-crypt" => Class::Encrypted,
        "en-note" | "span" | "font" | "u" | "ins" | "small" | "big" | "sub" | "sup" | "abbr"
        | "acronym" | "cite" | "dfn" | "q" | "bdo" | "center" | "thead" | "tbody" | "tfoot"
        | "section" | "article" | "header" | "footer" | "main" | "nav" | "aside" | "figure"
        | "figcaption" | "html" | "body" => Class::Transparent,
        "col" | "colgroup" | "map" | "area" | "style" | "script" | "head" | "title" => Class::Drop,
        _ => Class::Unknown,
    }
}

struct Frame {
    tag: String,
    class: Class,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
    /// Inside a code block: whitespace is kept as written.
    literal: bool,
}

/// Parse an ENML document (the content of a note's `<content>` element).
///
/// Unrecognized elements never fail the parse; they are reduced to their
/// text. Malformed XML and runaway nesting do.
pub fn parse_enml(markup: &str) -> Result<Document, NoteParseError> {
    let mut reader = Reader::from_str(markup);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Vec<Node> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| NoteParseError::Malformed(e.to_string()))?;

        match event {
            Event::Start(e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(NoteParseError::TooDeep(MAX_DEPTH));
                }
                let (tag, attributes) = read_tag(&e)?;
                let class = classify(&tag, &attributes);
                let literal = stack.last().is_some_and(|f| f.literal)
                    || class == Class::Element(ElementKind::CodeBlock);
                stack.push(Frame {
                    tag,
                    class,
                    attributes,
                    children: Vec::new(),
                    literal,
                });
            }
            Event::Empty(e) => {
                let (tag, attributes) = read_tag(&e)?;
                let class = classify(&tag, &attributes);
                let nodes = close(&tag, class, attributes, Vec::new())?;
                append(&mut stack, &mut root, nodes);
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or_else(|| {
                    NoteParseError::Malformed("closing tag without opening tag".to_string())
                })?;
                let nodes = close(&frame.tag, frame.class, frame.attributes, frame.children)?;
                append(&mut stack, &mut root, nodes);
            }
            Event::Text(e) => {
                let raw = String::from_utf8_lossy(&e);
                let decoded = html_escape::decode_html_entities(&raw);
                push_text(&mut stack, &mut root, &decoded);
            }
            Event::CData(e) => {
                let raw = String::from_utf8_lossy(&e);
                push_text(&mut stack, &mut root, &raw);
            }
            Event::Eof => break,
            // Declarations, doctype, comments, processing instructions.
            _ => {}
        }
    }

    if let Some(frame) = stack.last() {
        return Err(NoteParseError::Malformed(format!("unclosed <{}>", frame.tag)));
    }

    Ok(Document::new(root))
}

fn read_tag(e: &BytesStart<'_>) -> Result<(String, BTreeMap<String, String>), NoteParseError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();

    let mut attributes = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            NoteParseError::Malformed(format!("bad attribute on <{}>: {}", tag, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let raw = String::from_utf8_lossy(&attr.value);
        attributes.insert(key, html_escape::decode_html_entities(&raw).into_owned());
    }

    Ok((tag, attributes))
}

/// Turn a closed element into the nodes that replace it in its parent.
fn close(
    tag: &str,
    class: Class,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
) -> Result<Vec<Node>, NoteParseError> {
    let nodes = match class {
        Class::Element(kind) => vec![Node::Element(Element {
            kind,
            attributes,
            children,
        })],
        Class::Transparent => children,
        Class::Media => {
            let hash = attributes
                .get("hash")
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .ok_or(NoteParseError::MediaWithoutHash)?;
            let alt = attributes
                .get("alt")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
            vec![Node::ResourceRef { hash, alt }]
        }
        Class::Encrypted => vec![Node::text(ENCRYPTED_PLACEHOLDER)],
        Class::Drop => Vec::new(),
        Class::Unknown => {
            log::debug!("unrecognized <{}>, keeping its text", tag);
            let mut flat = Vec::new();
            flatten_inline(children, &mut flat);
            flat
        }
    };
    Ok(nodes)
}

/// Reduce nodes to text, keeping resource references so no attachment is lost.
fn flatten_inline(nodes: Vec<Node>, out: &mut Vec<Node>) {
    for node in nodes {
        match node {
            Node::Text(text) => push_merged(out, Node::Text(text)),
            Node::ResourceRef { .. } => out.push(node),
            Node::Element(el)
                if el.kind.is_block() || matches!(el.kind, ElementKind::LineBreak) =>
            {
                separate(out);
                flatten_inline(el.children, out);
                separate(out);
            }
            Node::Element(el) => flatten_inline(el.children, out),
        }
    }
}

/// Keep flattened blocks from running into their neighbours.
fn separate(out: &mut Vec<Node>) {
    if !out.is_empty() {
        push_merged(out, Node::text(" "));
    }
}

fn push_text(stack: &mut [Frame], root: &mut Vec<Node>, text: &str) {
    let literal = stack.last().is_some_and(|f| f.literal);
    let text = if literal {
        text.to_string()
    } else {
        WHITESPACE.replace_all(text, " ").into_owned()
    };
    if !text.is_empty() {
        append(stack, root, vec![Node::Text(text)]);
    }
}

fn append(stack: &mut [Frame], root: &mut Vec<Node>, nodes: Vec<Node>) {
    let target = match stack.last_mut() {
        Some(frame) => &mut frame.children,
        None => root,
    };
    for node in nodes {
        push_merged(target, node);
    }
}

/// Push a node, joining it with a preceding text node.
fn push_merged(nodes: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if let Some(Node::Text(prev)) = nodes.last_mut() {
            // Collapsed whitespace must not double up across node boundaries.
            if prev.ends_with(' ') && text.starts_with(' ') {
                prev.push_str(&text[1..]);
            } else {
                prev.push_str(text);
            }
            return;
        }
    }
    nodes.push(node);
}
