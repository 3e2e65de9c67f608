//! Inline formatting: the capability the block renderer delegates to.
//!
//! The renderer lowers inline markup into an [`InlineNode`] fragment (links
//! and attachments already rewritten into [`InlineNode::Raw`] Markdown) and
//! hands it to an [`InlineFormatter`], which returns Markdown text. Any
//! formatter can be swapped in without touching block-level rendering.

use regex::Regex;
use std::sync::LazyLock;

static ORDERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,9})([.)])(\s|$)").unwrap());

/// Inline styles the formatter knows how to delimit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStyle {
    Emphasis,
    Strong,
    Strikethrough,
}

/// A piece of inline markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineNode {
    Text(String),
    Styled {
        style: InlineStyle,
        children: Vec<InlineNode>,
    },
    Code(String),
    Break,
    /// Markdown produced by the renderer, emitted verbatim.
    Raw(String),
}

/// Fragment in, Markdown out.
pub trait InlineFormatter {
    fn format(&self, fragment: &[InlineNode]) -> String;
}

/// Default formatter producing CommonMark/GFM inline syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl InlineFormatter for MarkdownFormatter {
    fn format(&self, fragment: &[InlineNode]) -> String {
        let mut out = String::new();
        for node in fragment {
            match node {
                InlineNode::Text(text) => push_joined(&mut out, &escape(text)),
                InlineNode::Styled { style, children } => {
                    let inner = self.format(children);
                    push_joined(&mut out, &delimit(&inner, delimiter(*style)));
                }
                InlineNode::Code(code) => out.push_str(&code_span(code)),
                InlineNode::Break => out.push_str("  \n"),
                InlineNode::Raw(markdown) => out.push_str(markdown),
            }
        }
        out
    }
}

fn delimiter(style: InlineStyle) -> &'static str {
    match style {
        InlineStyle::Emphasis => "*",
        InlineStyle::Strong => "**",
        InlineStyle::Strikethrough => "~~",
    }
}

/// Append without doubling a space already at the end of `out`.
fn push_joined(out: &mut String, piece: &str) {
    if out.ends_with(' ') {
        out.push_str(piece.trim_start_matches(' '));
    } else {
        out.push_str(piece);
    }
}

/// Escape characters that would otherwise be read as inline Markdown or HTML.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '<' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a marker at the start of a line that would open a heading,
/// quote, list item or setext underline.
pub fn escape_line_start(line: &str) -> String {
    if line.starts_with(['#', '>', '-', '+', '=']) {
        return format!("\\{}", line);
    }
    ORDERED_MARKER.replace(line, "${1}\\${2}${3}").into_owned()
}

/// Wrap `inner` in delimiters, keeping surrounding whitespace outside them.
fn delimit(inner: &str, delim: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let start = inner.len() - inner.trim_start().len();
    let end = inner.trim_end().len();
    format!("{}{}{}{}{}", &inner[..start], delim, trimmed, delim, &inner[end..])
}

/// Inline code span with a fence longer than any backtick run inside.
pub fn code_span(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_run(code, '`') + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", fence, code, fence)
    } else {
        format!("{}{}{}", fence, code, fence)
    }
}

/// Length of the longest run of `c` in `text`.
pub fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
