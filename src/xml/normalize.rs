//! Canonical serialization of XML parts.
//!
//! Normalization rewrites a part so that two semantically equal parts produce
//! identical bytes:
//!
//! - namespace prefixes are replaced by canonical ones (the conventional OOXML
//!   prefix for well-known URIs, `ns0`, `ns1`, ... in URI order otherwise) and
//!   every declaration is hoisted to the root element, sorted by prefix;
//! - attributes are sorted by name;
//! - comments, processing instructions and whitespace-only text are dropped,
//!   and runs of whitespace in text collapse to one space (except under
//!   `xml:space="preserve"`);
//! - output is indented by two spaces per level under a standard declaration.
//!
//! The result is idempotent: normalizing normalized output returns it unchanged.

use crate::common::xml::{escape_attr, escape_text};
use crate::xml::dom::{NodeId, NodeKind, QName, XmlDocument};
use crate::xml::error::Result;
use crate::xml::namespace::{MARKUP_COMPAT_NS, XML_NS, canonical_prefix};
use indexmap::IndexMap;
use std::collections::BTreeSet;

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const INDENT: &str = "  ";

/// Normalize serialized XML.
pub fn normalize(xml: &[u8]) -> Result<Vec<u8>> {
    let doc = XmlDocument::parse(xml)?;
    Ok(normalize_document(&doc).into_bytes())
}

/// Normalize an already parsed document.
pub fn normalize_document(doc: &XmlDocument) -> String {
    let mut out = String::from(DECLARATION);
    let Some(root) = doc.document_element() else {
        return out;
    };
    let prefixes = assign_prefixes(doc, root);
    let writer = Writer { doc, prefixes: &prefixes };
    out.push('\n');
    writer.write(root, &mut out);
    out.push('\n');
    out
}

/// Map every namespace URI used in the tree to its canonical prefix.
fn assign_prefixes(doc: &XmlDocument, root: NodeId) -> IndexMap<String, String> {
    let mut uris: BTreeSet<String> = BTreeSet::new();
    for node in doc.descendants(root) {
        let Some(element) = doc.element(node) else {
            continue;
        };
        if let Some(uri) = doc.element_namespace(node) {
            uris.insert(uri.to_string());
        }
        for attr in &element.attributes {
            if let Some(uri) = doc.attribute_namespace(node, &attr.name) {
                uris.insert(uri.to_string());
            }
            if is_ignorable(doc, node, &attr.name) {
                for p in attr.value.split_whitespace() {
                    if let Some(uri) = doc.lookup_namespace(node, Some(p)) {
                        uris.insert(uri.to_string());
                    }
                }
            }
        }
    }
    uris.remove(XML_NS);

    let mut assigned = IndexMap::new();
    let mut next = 0usize;
    for uri in uris {
        let prefix = match canonical_prefix(&uri) {
            Some(p) => p.to_string(),
            None => {
                let p = format!("ns{}", next);
                next += 1;
                p
            },
        };
        assigned.insert(uri, prefix);
    }
    assigned.sort_by(|_, a, _, b| a.cmp(b));
    assigned
}

fn is_ignorable(doc: &XmlDocument, element: NodeId, name: &QName) -> bool {
    name.local == "Ignorable" && doc.attribute_namespace(element, name) == Some(MARKUP_COMPAT_NS)
}

struct Writer<'a> {
    doc: &'a XmlDocument,
    prefixes: &'a IndexMap<String, String>,
}

impl Writer<'_> {
    fn name(&self, uri: Option<&str>, name: &QName) -> String {
        match uri {
            Some(XML_NS) => format!("xml:{}", name.local),
            Some(uri) => match self.prefixes.get(uri) {
                Some(p) => format!("{}:{}", p, name.local),
                None => name.to_string(),
            },
            // unbound prefixes are kept literally
            None => name.to_string(),
        }
    }

    /// Write the subtree at `root` with an explicit work stack.
    fn write(&self, root: NodeId, out: &mut String) {
        let mut tasks = vec![Task::Open {
            id: root,
            depth: 0,
            preserve: false,
        }];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Emit(text) => out.push_str(&text),
                Task::Open { id, depth, preserve } => {
                    let mut next = self.open(id, depth, preserve, id == root, out);
                    next.reverse();
                    tasks.extend(next);
                },
            }
        }
    }

    /// Write the start tag of `id`; returns the work that completes it.
    fn open(&self, id: NodeId, depth: usize, preserve: bool, is_root: bool, out: &mut String) -> Vec<Task> {
        let doc = self.doc;
        let Some(element) = doc.element(id) else {
            return Vec::new();
        };
        let name = self.name(doc.element_namespace(id), &element.name);

        out.push('<');
        out.push_str(&name);
        if is_root {
            for (uri, prefix) in self.prefixes {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
                out.push_str(&escape_attr(uri));
                out.push('"');
            }
        }

        let mut attributes: Vec<(String, String)> = element
            .attributes
            .iter()
            .map(|a| {
                let value = if is_ignorable(doc, id, &a.name) {
                    a.value
                        .split_whitespace()
                        .map(|p| match doc.lookup_namespace(id, Some(p)).and_then(|u| self.prefixes.get(u)) {
                            Some(canonical) => canonical.as_str(),
                            None => p,
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                } else {
                    a.value.clone()
                };
                (self.name(doc.attribute_namespace(id, &a.name), &a.name), value)
            })
            .collect();
        attributes.sort();
        for (name, value) in &attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }

        let preserve = match element.attribute(&QName::new(Some("xml"), "space")) {
            Some("preserve") => true,
            Some(_) => false,
            None => preserve,
        };

        let children = self.content(id, preserve);
        if children.is_empty() {
            out.push_str("/>");
            return Vec::new();
        }
        out.push('>');

        let mut next = Vec::with_capacity(children.len() * 2 + 2);
        let only_text = children.iter().all(|c| matches!(c, Content::Text(_)));
        if preserve || only_text {
            // Elements inside preserved whitespace are written without indentation.
            for child in children {
                next.push(match child {
                    Content::Text(t) => Task::Emit(escape_text(&t)),
                    Content::Element(e) => Task::Open {
                        id: e,
                        depth: 0,
                        preserve: true,
                    },
                });
            }
        } else {
            for child in children {
                next.push(Task::Emit(line_break(depth + 1)));
                next.push(match child {
                    Content::Text(t) => Task::Emit(escape_text(&t)),
                    Content::Element(e) => Task::Open {
                        id: e,
                        depth: depth + 1,
                        preserve,
                    },
                });
            }
            next.push(Task::Emit(line_break(depth)));
        }
        next.push(Task::Emit(format!("</{}>", name)));
        next
    }

    /// Significant children with adjacent text merged.
    fn content(&self, id: NodeId, preserve: bool) -> Vec<Content> {
        let mut items: Vec<Content> = Vec::new();
        for &child in self.doc.children(id) {
            match self.doc.kind(child) {
                NodeKind::Text(t) | NodeKind::CData(t) => match items.last_mut() {
                    Some(Content::Text(existing)) => existing.push_str(t),
                    _ => items.push(Content::Text(t.clone())),
                },
                NodeKind::Element(_) => items.push(Content::Element(child)),
                _ => {},
            }
        }
        items
            .into_iter()
            .filter_map(|item| match item {
                Content::Text(t) if preserve => (!t.is_empty()).then_some(Content::Text(t)),
                Content::Text(t) => {
                    let collapsed = t.split_whitespace().collect::<Vec<_>>().join(" ");
                    (!collapsed.is_empty()).then_some(Content::Text(collapsed))
                },
                element => Some(element),
            })
            .collect()
    }
}

enum Content {
    Text(String),
    Element(NodeId),
}

enum Task {
    Open { id: NodeId, depth: usize, preserve: bool },
    Emit(String),
}

fn line_break(depth: usize) -> String {
    format!("\n{}", INDENT.repeat(depth))
}
