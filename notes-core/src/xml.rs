//! Minimal owned element tree over `quick-xml`.
//!
//! Both the persisted format and the snapshot differ read documents through
//! [`parse_document`]. Attribute order is kept as written so serialization is
//! stable, but [`Element::equivalent`] ignores it.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{NotesError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_owned(),
            None => self.attributes.push((key.to_owned(), value.to_owned())),
        }
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_owned()));
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Structural equality: same name, same attribute set in any order,
    /// same children in order, text compared with surrounding whitespace trimmed.
    pub fn equivalent(&self, other: &Element) -> bool {
        if self.name != other.name || self.attributes.len() != other.attributes.len() {
            return false;
        }
        let mut mine = self.attributes.clone();
        let mut theirs = other.attributes.clone();
        mine.sort();
        theirs.sort();
        if mine != theirs || self.children.len() != other.children.len() {
            return false;
        }
        self.children
            .iter()
            .zip(&other.children)
            .all(|pair| match pair {
                (Node::Element(a), Node::Element(b)) => a.equivalent(b),
                (Node::Text(a), Node::Text(b)) => a.trim() == b.trim(),
                _ => false,
            })
    }

    /// Serializes the element and its subtree, escaping attribute values and
    /// text. Each child element goes on its own tab-indented line; elements
    /// holding text are written inline.
    pub fn to_pretty_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out, Some("\t"), 0);
        out
    }

    fn write_into(&self, out: &mut String, indent: Option<&str>, depth: usize) {
        let _ = write!(out, "<{}", self.name);
        for (k, v) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", k, escape(v.as_str()));
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        let has_text = self.children.iter().any(|n| matches!(n, Node::Text(_)));
        let indent = if has_text { None } else { indent };
        for child in &self.children {
            if let Some(unit) = indent {
                out.push('\n');
                out.push_str(&unit.repeat(depth + 1));
            }
            match child {
                Node::Element(e) => e.write_into(out, indent, depth + 1),
                Node::Text(t) => out.push_str(&escape(t.as_str())),
            }
        }
        if let Some(unit) = indent {
            out.push('\n');
            out.push_str(&unit.repeat(depth));
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// Parses `text` into its single root element.
///
/// Whitespace-only text between child elements, comments, processing
/// instructions, and the XML declaration are dropped. Text and CDATA runs
/// are decoded and merged.
///
/// # Errors
///
/// Returns `NotesError::Format` (labelled with `source_name`) for malformed
/// markup, unclosed elements, a missing root, or content after the root.
pub(crate) fn parse_document(text: &str, source_name: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    let bad = |reason: String| NotesError::format(source_name, reason);

    loop {
        let event = reader
            .read_event()
            .map_err(|e| bad(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => {
                let element = open_element(&start).map_err(bad)?;
                if stack.is_empty() && root.is_some() {
                    return Err(bad("content after the root element".into()));
                }
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start).map_err(bad)?;
                close_element(element, &mut stack, &mut root).map_err(bad)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| bad("unexpected closing tag".into()))?;
                close_element(element, &mut stack, &mut root).map_err(bad)?;
            }
            Event::Text(t) => {
                let decoded = t.unescape().map_err(|e| bad(e.to_string()))?;
                append_text(&mut stack, &decoded).map_err(bad)?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let decoded = std::str::from_utf8(&raw).map_err(|e| bad(e.to_string()))?;
                append_text(&mut stack, decoded).map_err(bad)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(bad(format!("element <{}> is never closed", open.name)));
    }
    let mut root = root.ok_or_else(|| bad("document has no root element".into()))?;
    strip_layout_whitespace(&mut root);
    Ok(root)
}

fn open_element(start: &BytesStart<'_>) -> std::result::Result<Element, String> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_owned();
    let mut element = Element::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_element(element);
            Ok(())
        }
        None if root.is_some() => Err("content after the root element".into()),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn append_text(stack: &mut [Element], text: &str) -> std::result::Result<(), String> {
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err("text outside the root element".into());
    };
    if let Some(Node::Text(prev)) = parent.children.last_mut() {
        prev.push_str(text);
        return Ok(());
    }
    parent.push_text(text);
    Ok(())
}

/// Drops whitespace-only text nodes throughout the tree, so an element
/// written as `<a>\n  </a>` reads the same as `<a/>`.
fn strip_layout_whitespace(element: &mut Element) {
    element
        .children
        .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
    for child in element.children.iter_mut() {
        if let Node::Element(e) = child {
            strip_layout_whitespace(e);
        }
    }
}
