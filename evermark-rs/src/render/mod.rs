//! Markdown rendering of a parsed note body.
//!
//! The renderer owns block structure (paragraphs, headings, lists, tables,
//! code blocks, quotes) and the rewriting of links and attachment
//! references. Inline styling is delegated to an [`InlineFormatter`].

pub mod inline;

pub use inline::{InlineFormatter, InlineNode, InlineStyle, MarkdownFormatter};

use crate::resources::ResourceMap;
use crate::types::{Document, Element, ElementKind, Node};
use inline::{escape_line_start, longest_run};

/// Render a document with the default formatter.
pub fn render(document: &Document, resources: &ResourceMap) -> String {
    MarkdownRenderer::new(resources).render(document)
}

/// Placeholder text for an attachment that has no file in the vault.
pub fn missing_attachment(label: &str) -> String {
    format!("[missing attachment: {}]", label)
}

/// Block-level Markdown renderer.
pub struct MarkdownRenderer<'a> {
    resources: &'a ResourceMap,
    formatter: &'a dyn InlineFormatter,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(resources: &'a ResourceMap) -> Self {
        Self {
            resources,
            formatter: &MarkdownFormatter,
        }
    }

    /// Use a different inline formatter.
    pub fn with_formatter(resources: &'a ResourceMap, formatter: &'a dyn InlineFormatter) -> Self {
        Self {
            resources,
            formatter,
        }
    }

    pub fn render(&self, document: &Document) -> String {
        self.render_blocks(&document.children).join("\n\n")
    }

    fn render_blocks<'n>(&self, nodes: impl IntoIterator<Item = &'n Node>) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut run: Vec<&Node> = Vec::new();

        for node in nodes {
            match node {
                Node::Element(el) if el.kind.is_block() => {
                    blocks.extend(self.paragraph(&run));
                    run.clear();
                    blocks.extend(self.render_block(el));
                }
                _ => run.push(node),
            }
        }
        blocks.extend(self.paragraph(&run));

        blocks.retain(|b| !b.trim().is_empty());
        blocks
    }

    fn render_block(&self, el: &Element) -> Vec<String> {
        match el.kind {
            ElementKind::Paragraph | ElementKind::TableCell { .. } => {
                if el.children.iter().any(is_block) {
                    self.render_blocks(&el.children)
                } else {
                    let run: Vec<&Node> = el.children.iter().collect();
                    self.paragraph(&run).into_iter().collect()
                }
            }
            ElementKind::Heading(level) => {
                let text = self.single_line(&el.children);
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("{} {}", "#".repeat(level.clamp(1, 6) as usize), text)]
                }
            }
            ElementKind::List { .. } => vec![self.list(el)],
            ElementKind::ListItem => {
                let nodes: Vec<&Node> = el.children.iter().collect();
                vec![self.list_item("- ", &nodes)]
            }
            ElementKind::Table => self.table(&el.children).into_iter().collect(),
            ElementKind::TableRow => self.table(std::slice::from_ref(&Node::Element(el.clone())))
                .into_iter()
                .collect(),
            ElementKind::CodeBlock => self.code_block(el).into_iter().collect(),
            ElementKind::Blockquote => {
                let inner = self.render_blocks(&el.children).join("\n\n");
                if inner.is_empty() {
                    Vec::new()
                } else {
                    vec![prefix_lines(&inner, ">")]
                }
            }
            ElementKind::Rule => vec!["---".to_string()],
            _ => Vec::new(),
        }
    }

    /// Render a run of inline nodes as one paragraph.
    fn paragraph(&self, run: &[&Node]) -> Option<String> {
        let (task, rest) = split_checkbox(run);
        let text = self.inline(rest.iter().copied());

        match task {
            Some(checked) => Some(format!("- {}{}", checkbox(checked), text).trim_end().to_string()),
            None if text.is_empty() => None,
            None => Some(text),
        }
    }

    /// Format inline nodes and tidy the result.
    fn inline<'n>(&self, nodes: impl IntoIterator<Item = &'n Node>) -> String {
        let mut fragment = Vec::new();
        for node in nodes {
            self.lower(node, &mut fragment);
        }
        let formatted = self.formatter.format(&fragment);

        let lines: Vec<String> = formatted
            .split('\n')
            .map(|line| escape_line_start(line.trim_start()))
            .collect();
        lines.join("\n").trim().to_string()
    }

    fn single_line(&self, nodes: &[Node]) -> String {
        let text = self.inline(nodes).replace("  \n", " ").replace('\n', " ");
        text.trim().to_string()
    }

    /// Lower a node into the formatter's inline vocabulary.
    fn lower(&self, node: &Node, out: &mut Vec<InlineNode>) {
        let el = match node {
            Node::Text(text) => {
                out.push(InlineNode::Text(text.clone()));
                return;
            }
            Node::ResourceRef { hash, alt } => {
                out.push(InlineNode::Raw(self.embed(hash, alt.as_deref())));
                return;
            }
            Node::Element(el) => el,
        };

        match el.kind {
            ElementKind::Emphasis | ElementKind::Strong | ElementKind::Strikethrough => {
                let style = match el.kind {
                    ElementKind::Emphasis => InlineStyle::Emphasis,
                    ElementKind::Strong => InlineStyle::Strong,
                    _ => InlineStyle::Strikethrough,
                };
                let mut children = Vec::new();
                for child in &el.children {
                    self.lower(child, &mut children);
                }
                out.push(InlineNode::Styled { style, children });
            }
            ElementKind::Code => out.push(InlineNode::Code(el_text(el))),
            ElementKind::LineBreak => out.push(InlineNode::Break),
            ElementKind::Link => out.push(InlineNode::Raw(self.link(el))),
            ElementKind::Image => out.push(InlineNode::Raw(image(el))),
            ElementKind::Checkbox { checked } => {
                out.push(InlineNode::Raw(checkbox(checked).to_string()))
            }
            _ => {
                // Block content in an inline context (cells, headings).
                for child in &el.children {
                    self.lower(child, out);
                }
                out.push(InlineNode::Text(" ".to_string()));
            }
        }
    }

    fn link(&self, el: &Element) -> String {
        let text = self.single_line(&el.children);
        let href = el.attr("href").map(str::trim).filter(|h| !h.is_empty());

        match href {
            None => text,
            Some(href) if text.is_empty() => format!("<{}>", href),
            Some(href) => format!("[{}]({})", text, destination(href)),
        }
    }

    fn embed(&self, hash: &str, alt: Option<&str>) -> String {
        match self.resources.get(hash) {
            Some(entry) => match &entry.link {
                Some(link) => {
                    let alt = alt.or(entry.file_name.as_deref()).unwrap_or("");
                    format!("![{}]({})", escape_brackets(alt), link)
                }
                None => missing_attachment(entry.file_name.as_deref().unwrap_or(hash)),
            },
            None => missing_attachment(hash),
        }
    }

    fn list(&self, el: &Element) -> String {
        let ordered = matches!(el.kind, ElementKind::List { ordered: true });
        let mut number: usize = el
            .attr("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        let mut items: Vec<String> = Vec::new();
        let mut last_width = 2;

        for child in &el.children {
            let marker = if ordered {
                format!("{}. ", number)
            } else {
                "- ".to_string()
            };

            match child {
                Node::Text(text) if text.trim().is_empty() => {}
                // <ul><li>a</li><ul>..</ul></ul>: the nested list belongs to the previous item.
                Node::Element(nested) if matches!(nested.kind, ElementKind::List { .. }) => {
                    let rendered = self.list(nested);
                    match items.last_mut() {
                        Some(prev) if !rendered.is_empty() => {
                            prev.push('\n');
                            prev.push_str(&indent(&rendered, last_width));
                        }
                        Some(_) => {}
                        None => items.push(rendered),
                    }
                }
                Node::Element(item) if item.kind == ElementKind::ListItem => {
                    let nodes: Vec<&Node> = item.children.iter().collect();
                    items.push(self.list_item(&marker, &nodes));
                    last_width = marker.len();
                    number += 1;
                }
                other => {
                    items.push(self.list_item(&marker, &[other]));
                    last_width = marker.len();
                    number += 1;
                }
            }
        }

        items.join("\n")
    }

    fn list_item(&self, marker: &str, nodes: &[&Node]) -> String {
        let (task, rest) = split_checkbox(nodes);
        let marker = match task {
            Some(checked) => format!("{}{}", marker, checkbox(checked)),
            None => marker.to_string(),
        };

        let body = self.render_blocks(rest.iter().copied()).join("\n");
        if body.is_empty() {
            return marker.trim_end().to_string();
        }

        let width = marker.chars().count();
        let mut lines = body.lines();
        let mut out = format!("{}{}", marker, lines.next().unwrap_or(""));
        for line in lines {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&" ".repeat(width));
                out.push_str(line);
            }
        }
        out
    }

    fn table(&self, children: &[Node]) -> Option<String> {
        let rows: Vec<Vec<String>> = children
            .iter()
            .filter_map(Node::as_element)
            .filter(|row| row.kind == ElementKind::TableRow)
            .map(|row| {
                row.children
                    .iter()
                    .filter_map(Node::as_element)
                    .filter(|cell| matches!(cell.kind, ElementKind::TableCell { .. }))
                    .map(|cell| self.cell(cell))
                    .collect::<Vec<String>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        let width = rows.iter().map(Vec::len).max()?;
        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (i, row) in rows.iter().enumerate() {
            let mut cells = row.clone();
            cells.resize(width, String::new());
            lines.push(format!("| {} |", cells.join(" | ")));
            if i == 0 {
                lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
            }
        }
        Some(lines.join("\n"))
    }

    fn cell(&self, cell: &Element) -> String {
        self.render_blocks(&cell.children)
            .join(" ")
            .replace("  \n", " ")
            .replace('\n', " ")
            .replace('|', "\\|")
            .trim()
            .to_string()
    }

    fn code_block(&self, el: &Element) -> Option<String> {
        let mut code = String::new();
        literal_text(&el.children, &mut code);
        let code = code.trim_matches('\n');
        if code.trim().is_empty() {
            return None;
        }
        let fence = "`".repeat((longest_run(code, '`') + 1).max(3));
        Some(format!("{}\n{}\n{}", fence, code, fence))
    }
}

fn is_block(node: &Node) -> bool {
    node.as_element().is_some_and(|el| el.kind.is_block())
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x] " } else { "[ ] " }
}

/// Split off a leading `en-todo` (ignoring whitespace before it).
fn split_checkbox<'r, 'n>(nodes: &'r [&'n Node]) -> (Option<bool>, &'r [&'n Node]) {
    for (i, node) in nodes.iter().enumerate() {
        match node {
            Node::Text(text) if text.trim().is_empty() => continue,
            Node::Element(el) => {
                if let ElementKind::Checkbox { checked } = el.kind {
                    return (Some(checked), &nodes[i + 1..]);
                }
                return (None, nodes);
            }
            _ => return (None, nodes),
        }
    }
    (None, nodes)
}

/// Text of a code block: line breaks and nested blocks become newlines.
fn literal_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::ResourceRef { .. } => {}
            Node::Element(el) => match el.kind {
                ElementKind::LineBreak => out.push('\n'),
                kind if kind.is_block() => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    literal_text(&el.children, out);
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => literal_text(&el.children, out),
            },
        }
    }
}

fn el_text(el: &Element) -> String {
    el.children.iter().map(Node::text_content).collect::<String>()
}

fn image(el: &Element) -> String {
    let alt = el.attr("alt").unwrap_or("").trim();
    match el.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
        Some(src) => format!("![{}]({})", escape_brackets(alt), destination(src)),
        None => escape_brackets(alt),
    }
}

/// Link destination, bracketed when it contains characters that would end it.
fn destination(url: &str) -> String {
    if url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                prefix.to_string()
            } else {
                format!("{} {}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
