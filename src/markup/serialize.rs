//! Serialization of a [`Dom`] subtree.
//!
//! [`Syntax::Xhtml`] output rules:
//! - void elements close themselves (`<img src="a.png" />`)
//! - anchors without children collapse to `<a id="x" />`
//! - all text, including script and style bodies, and attribute values use
//!   numeric character references only, so the result never depends on an
//!   HTML entity table
//!
//! [`Syntax::Html`] output parses back into the same tree: every non-void
//! element gets an end tag and raw-text bodies are written verbatim.

use std::fmt::Write;

use super::arena::{Dom, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text the HTML tokenizer does not decode.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "script", "style", "xmp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Xhtml,
    Html,
}

/// Serialize the children of `parent`.
pub fn serialize_children(dom: &Dom, parent: NodeId, syntax: Syntax) -> String {
    let mut out = String::new();
    for child in dom.children(parent) {
        write_node(dom, child, syntax, false, &mut out);
    }
    out
}

fn write_node(dom: &Dom, id: NodeId, syntax: Syntax, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, syntax, false, out);
            }
        }
        NodeData::Comment(text) => write_comment(text, out),
        NodeData::Text(text) => {
            if raw_text && syntax == Syntax::Html {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        NodeData::Element { name, attrs } => {
            let tag = qualified(name.prefix.as_deref(), &name.local);
            out.push('<');
            out.push_str(&tag);
            for attr in attrs {
                out.push(' ');
                out.push_str(&qualified(attr.name.prefix.as_deref(), &attr.name.local));
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }

            let local = name.local.as_ref();
            if VOID_ELEMENTS.contains(&local) {
                out.push_str(match syntax {
                    Syntax::Xhtml => " />",
                    Syntax::Html => ">",
                });
                return;
            }
            let has_children = dom.children(id).next().is_some();
            if syntax == Syntax::Xhtml && local == "a" && !has_children {
                out.push_str(" />");
                return;
            }

            out.push('>');
            let raw = RAW_TEXT_ELEMENTS.contains(&local);
            for child in dom.children(id) {
                write_node(dom, child, syntax, raw, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
    }
}

/// Write a comment, breaking up `--` runs and a trailing `-`.
fn write_comment(text: &str, out: &mut String) {
    out.push_str("<!--");
    let mut previous = None;
    for c in text.chars() {
        if c == '-' && previous == Some('-') {
            out.push(' ');
        }
        out.push(c);
        previous = Some(c);
    }
    if previous == Some('-') {
        out.push(' ');
    }
    out.push_str("-->");
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Escape markup-significant and non-ASCII characters as `&#N;`.
pub fn escape_into(text: &str, in_attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' | '<' | '>' => {
                let _ = write!(out, "&#{};", c as u32);
            }
            '"' if in_attribute => out.push_str("&#34;"),
            c if !c.is_ascii() => {
                let _ = write!(out, "&#{};", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Escape text content into a new buffer. See [`escape_into`].
pub fn escape_numeric(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, false, &mut out);
    out
}

/// Escape an attribute value into a new buffer.
pub fn escape_attribute(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, true, &mut out);
    out
}
