//! Mutable XML tree for package parts.
//!
//! Nodes live in an arena owned by [`XmlDocument`] and are addressed by
//! [`NodeId`]. Detached nodes stay in the arena but are never serialized.
//! Namespace declarations are kept exactly where the source put them, and
//! prefixes are resolved on demand by walking ancestors, so a part that is
//! parsed and written back keeps its prefixes, `mc:Ignorable` lists and
//! declaration placement.

use crate::common::xml::{escape_attr, escape_text, unescape_xml};
use crate::xml::error::{Result, XmlError};
use crate::xml::namespace::XML_NS;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;

/// Handle to a node inside one [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A possibly prefixed XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(prefix: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    /// Split `"p:local"` at the first colon.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self::new(Some(prefix), local),
            None => Self::new(None, raw),
        }
    }

    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// `xmlns` (prefix `None`) or `xmlns:prefix` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub namespaces: Vec<NamespaceDecl>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Attribute lookup by its literal (possibly prefixed) name.
    pub fn attribute_by_name(&self, raw: &str) -> Option<&str> {
        self.attribute(&QName::parse(raw))
    }

    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        match self
            .namespaces
            .iter_mut()
            .find(|d| d.prefix.as_deref() == prefix)
        {
            Some(existing) => existing.uri = uri.to_string(),
            None => self.namespaces.push(NamespaceDecl {
                prefix: prefix.map(str::to_string),
                uri: uri.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An XML document or fragment.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
    declaration: Option<String>,
}

const DOCUMENT: NodeId = NodeId(0);

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// An empty document with no root element.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            declaration: None,
        }
    }

    /// Parse a complete document: exactly one root element, optional prolog.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = decode(bytes)?;
        let doc = Self::parse_str(text, false)?;
        doc.document_element().ok_or(XmlError::NoRoot)?;
        Ok(doc)
    }

    /// Parse a fragment: any sequence of elements and text with no prolog.
    ///
    /// The fragment nodes become the children of the returned document's root
    /// node. Prefixes are not checked here; the caller binds them against the
    /// insertion point.
    pub fn parse_fragment(text: &str) -> Result<Self> {
        Self::parse_str(text, true)
    }

    fn parse_str(text: &str, fragment: bool) -> Result<Self> {
        let mut doc = Self::new();
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<NodeId> = vec![DOCUMENT];

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| XmlError::Malformed {
                position,
                message: e.to_string(),
            })?;
            let parent = *stack.last().unwrap_or(&DOCUMENT);

            match event {
                Event::Decl(d) => {
                    if !fragment {
                        doc.declaration = Some(utf8(&d)?.to_string());
                    }
                },
                Event::Start(e) => {
                    doc.check_single_root(parent, fragment)?;
                    let element = element_from_start(&e, position)?;
                    let id = doc.push(NodeKind::Element(element));
                    doc.append_child(parent, id);
                    stack.push(id);
                },
                Event::Empty(e) => {
                    doc.check_single_root(parent, fragment)?;
                    let element = element_from_start(&e, position)?;
                    let id = doc.push(NodeKind::Element(element));
                    doc.append_child(parent, id);
                },
                Event::End(_) => {
                    stack.pop();
                },
                Event::Text(t) => {
                    let raw = utf8(&t)?;
                    doc.push_text(parent, &unescape_xml(raw), fragment)?;
                },
                Event::GeneralRef(r) => {
                    let name = utf8(&r)?;
                    let reference = format!("&{};", name);
                    let resolved = unescape_xml(&reference);
                    if resolved == reference {
                        return Err(XmlError::UnknownEntity(name.to_string()));
                    }
                    doc.push_text(parent, &resolved, fragment)?;
                },
                Event::CData(c) => {
                    if parent == DOCUMENT && !fragment {
                        return Err(XmlError::TextOutsideRoot);
                    }
                    let id = doc.push(NodeKind::CData(utf8(&c)?.to_string()));
                    doc.append_child(parent, id);
                },
                Event::Comment(c) => {
                    let id = doc.push(NodeKind::Comment(utf8(&c)?.to_string()));
                    doc.append_child(parent, id);
                },
                Event::PI(p) => {
                    let id = doc.push(NodeKind::ProcessingInstruction(utf8(&p)?.to_string()));
                    doc.append_child(parent, id);
                },
                Event::DocType(d) => {
                    let id = doc.push(NodeKind::DocType(utf8(&d)?.to_string()));
                    doc.append_child(parent, id);
                },
                Event::Eof => break,
                #[allow(unreachable_patterns)]
                _ => {},
            }
        }

        if stack.len() > 1 {
            let open = stack[stack.len() - 1];
            let name = doc
                .element(open)
                .map(|e| e.name.to_string())
                .unwrap_or_default();
            return Err(XmlError::Unclosed(name));
        }

        Ok(doc)
    }

    fn check_single_root(&self, parent: NodeId, fragment: bool) -> Result<()> {
        if !fragment && parent == DOCUMENT && self.document_element().is_some() {
            return Err(XmlError::MultipleRoots);
        }
        Ok(())
    }

    fn push_text(&mut self, parent: NodeId, text: &str, fragment: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if parent == DOCUMENT && !fragment && !text.trim().is_empty() {
            return Err(XmlError::TextOutsideRoot);
        }
        if let Some(&last) = self.nodes[parent.0].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last.0].kind
        {
            existing.push_str(text);
            return Ok(());
        }
        let id = self.push(NodeKind::Text(text.to_string()));
        self.append_child(parent, id);
        Ok(())
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// The document node.
    #[inline]
    pub fn root(&self) -> NodeId {
        DOCUMENT
    }

    /// The single top-level element, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    #[inline]
    pub fn declaration(&self) -> Option<&str> {
        self.declaration.as_deref()
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c))
    }

    #[inline]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element(_))
    }

    #[inline]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Whether `id` is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == DOCUMENT {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Position of every attached node in document order, indexed by node id.
    pub fn document_order(&self) -> Vec<usize> {
        let mut order = vec![usize::MAX; self.nodes.len()];
        for (i, node) in self.descendants(DOCUMENT).into_iter().enumerate() {
            order[node.0] = i;
        }
        order
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) => t.clone(),
            NodeKind::ProcessingInstruction(p) => p.clone(),
            NodeKind::DocType(_) => String::new(),
            NodeKind::Document | NodeKind::Element(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let NodeKind::Text(t) | NodeKind::CData(t) = &self.nodes[node.0].kind {
                        out.push_str(t);
                    }
                }
                out
            },
        }
    }

    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    /// Resolve `prefix` (or the default namespace for `None`) in scope at `id`.
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node)
                && let Some(decl) = element
                    .namespaces
                    .iter()
                    .find(|d| d.prefix.as_deref() == prefix)
            {
                // `xmlns=""` undeclares the default namespace
                return if decl.uri.is_empty() { None } else { Some(&decl.uri) };
            }
            current = self.parent(node);
        }
        None
    }

    /// Namespace URI of an element's name.
    pub fn element_namespace(&self, id: NodeId) -> Option<&str> {
        let element = self.element(id)?;
        self.lookup_namespace(id, element.name.prefix())
    }

    /// Namespace URI of an attribute on element `id`; unprefixed attributes have none.
    pub fn attribute_namespace(&self, id: NodeId, name: &QName) -> Option<&str> {
        name.prefix().and_then(|p| self.lookup_namespace(id, Some(p)))
    }

    /// Every prefix binding visible at `id`, innermost first, without duplicates.
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<NamespaceDecl> {
        let mut seen: Vec<NamespaceDecl> = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                for decl in &element.namespaces {
                    if !seen.iter().any(|s| s.prefix == decl.prefix) {
                        seen.push(decl.clone());
                    }
                }
            }
            current = self.parent(node);
        }
        seen
    }

    /// Prefixes used by element and attribute names in the subtree at `id`.
    pub fn used_prefixes(&self, id: NodeId) -> Vec<Option<String>> {
        let mut out: Vec<Option<String>> = Vec::new();
        for node in self.descendants(id) {
            if let Some(element) = self.element(node) {
                let mut names = vec![element.name.prefix.clone()];
                names.extend(
                    element
                        .attributes
                        .iter()
                        .filter(|a| a.name.prefix.is_some())
                        .map(|a| a.name.prefix.clone()),
                );
                for p in names {
                    if !out.contains(&p) {
                        out.push(p);
                    }
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.push(NodeKind::Element(Element::new(name)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Unlink `id` from its parent. The node and its subtree stay valid.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `child` as the sibling immediately before `reference`.
    ///
    /// Returns `false` when `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let index = self.child_index(parent, reference);
        self.insert_child(parent, index, child);
        true
    }

    /// Insert `child` as the sibling immediately after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        let index = self.child_index(parent, reference) + 1;
        self.insert_child(parent, index, child);
        true
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == child)
            .unwrap_or(self.nodes[parent.0].children.len())
    }

    /// Replace the leading character data of an element, keeping child elements.
    ///
    /// For text, CDATA and comment nodes the content is replaced directly.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) = &mut self.nodes[id.0].kind {
            *t = text.to_string();
            return;
        }
        if !matches!(self.nodes[id.0].kind, NodeKind::Element(_) | NodeKind::Document) {
            return;
        }
        let leading: Vec<NodeId> = self.nodes[id.0]
            .children
            .iter()
            .copied()
            .take_while(|&c| matches!(self.nodes[c.0].kind, NodeKind::Text(_) | NodeKind::CData(_)))
            .collect();
        for node in leading {
            self.detach(node);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.insert_child(id, 0, node);
        }
    }

    /// Deep-copy `src_id` from `src` into this document as a detached subtree.
    pub fn import(&mut self, src: &XmlDocument, src_id: NodeId) -> NodeId {
        let top = self.push(src.kind(src_id).clone());
        let mut pending = vec![(src_id, top)];
        while let Some((from, to)) = pending.pop() {
            for &child in src.children(from) {
                let copied = self.push(src.kind(child).clone());
                self.nodes[copied.0].parent = Some(to);
                self.nodes[to.0].children.push(copied);
                pending.push((child, copied));
            }
        }
        top
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the whole document, including the XML declaration if present.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 32);
        if let Some(decl) = &self.declaration {
            out.push_str("<?");
            out.push_str(decl);
            out.push_str("?>");
        }
        for &child in self.children(DOCUMENT) {
            self.write_node(child, &mut out);
        }
        out
    }

    pub fn to_xml_bytes(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    /// Serialize one node and its subtree.
    pub fn node_to_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![Visit::Enter(id)];
        while let Some(visit) = stack.pop() {
            let id = match visit {
                Visit::Enter(id) => id,
                Visit::Leave(id) => {
                    if let NodeKind::Element(element) = &self.nodes[id.0].kind {
                        out.push_str("</");
                        out.push_str(&element.name.to_string());
                        out.push('>');
                    }
                    continue;
                },
            };
            match &self.nodes[id.0].kind {
                NodeKind::Document => {
                    stack.extend(self.children(id).iter().rev().map(|&c| Visit::Enter(c)));
                },
                NodeKind::Element(element) => {
                    out.push('<');
                    out.push_str(&element.name.to_string());
                    for decl in &element.namespaces {
                        match &decl.prefix {
                            Some(p) => {
                                out.push_str(" xmlns:");
                                out.push_str(p);
                            },
                            None => out.push_str(" xmlns"),
                        }
                        out.push_str("=\"");
                        out.push_str(&escape_attr(&decl.uri));
                        out.push('"');
                    }
                    for attr in &element.attributes {
                        out.push(' ');
                        out.push_str(&attr.name.to_string());
                        out.push_str("=\"");
                        out.push_str(&escape_attr(&attr.value));
                        out.push('"');
                    }
                    let children = self.children(id);
                    if children.is_empty() {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        stack.push(Visit::Leave(id));
                        stack.extend(children.iter().rev().map(|&c| Visit::Enter(c)));
                    }
                },
                NodeKind::Text(t) => out.push_str(&escape_text(t)),
                NodeKind::CData(c) => {
                    out.push_str("<![CDATA[");
                    out.push_str(c);
                    out.push_str("]]>");
                },
                NodeKind::Comment(c) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                },
                NodeKind::ProcessingInstruction(p) => {
                    out.push_str("<?");
                    out.push_str(p);
                    out.push_str("?>");
                },
                NodeKind::DocType(d) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(d);
                    out.push('>');
                },
            }
        }
    }
}

/// Serializer work item: open a node, or close an element after its children.
enum Visit {
    Enter(NodeId),
    Leave(NodeId),
}

fn decode(bytes: &[u8]) -> Result<&str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| XmlError::Utf8(e.to_string()))
}

#[inline]
fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| XmlError::Utf8(e.to_string()))
}

fn element_from_start(e: &BytesStart<'_>, position: u64) -> Result<Element> {
    let name = QName::parse(utf8(e.name().as_ref())?);
    let mut element = Element::new(name);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError::Malformed {
            position,
            message: err.to_string(),
        })?;
        let key = utf8(attr.key.as_ref())?;
        let value = unescape_xml(utf8(&attr.value)?);
        if key == "xmlns" {
            element.namespaces.push(NamespaceDecl { prefix: None, uri: value });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.push(NamespaceDecl {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            element.attributes.push(Attribute {
                name: QName::parse(key),
                value,
            });
        }
    }

    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Tom &amp; Jerry</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_parse_and_serialize_round_trip() {
        let doc = XmlDocument::parse(SLIDE.as_bytes()).unwrap();
        assert_eq!(doc.to_xml_string(), SLIDE);
        assert_eq!(
            doc.declaration(),
            Some(r#"xml version="1.0" encoding="UTF-8" standalone="yes""#)
        );
    }

    #[test]
    fn test_text_and_namespaces() {
        let doc = XmlDocument::parse(SLIDE.as_bytes()).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(
            doc.element_namespace(root),
            Some("http://schemas.openxmlformats.org/presentationml/2006/main")
        );
        assert_eq!(doc.text_content(root), "Tom & Jerry");
        let t = *doc.descendants(root).iter().rev().nth(1).unwrap();
        assert_eq!(doc.element(t).unwrap().name.to_string(), "a:t");
        assert_eq!(
            doc.element_namespace(t),
            Some("http://schemas.openxmlformats.org/drawingml/2006/main")
        );
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            XmlDocument::parse(b"<a><b></a>"),
            Err(XmlError::Malformed { .. })
        ));
        assert!(matches!(
            XmlDocument::parse(b"<a><b>"),
            Err(XmlError::Unclosed(_) | XmlError::Malformed { .. })
        ));
        assert_eq!(XmlDocument::parse(b"<a/><b/>").unwrap_err(), XmlError::MultipleRoots);
        assert_eq!(XmlDocument::parse(b"").unwrap_err(), XmlError::NoRoot);
        assert_eq!(XmlDocument::parse(b"<a>&nbsp;</a>").unwrap_err(), XmlError::UnknownEntity("nbsp".into()));
    }

    #[test]
    fn test_fragment_with_multiple_roots() {
        let frag = XmlDocument::parse_fragment("<a:r><a:t>x</a:t></a:r>tail<a:br/>").unwrap();
        assert_eq!(frag.children(frag.root()).len(), 3);
        assert!(XmlDocument::parse_fragment("<a:r>").is_err());
    }

    #[test]
    fn test_mutation_and_import() {
        let mut doc = XmlDocument::parse(b"<root><a/><c/></root>").unwrap();
        let root = doc.document_element().unwrap();
        let frag = XmlDocument::parse_fragment("<b x=\"1\"/>").unwrap();
        let b = doc.import(&frag, frag.children(frag.root())[0]);
        let c = doc.children(root)[1];
        assert!(doc.insert_before(c, b));
        assert_eq!(doc.to_xml_string(), r#"<root><a/><b x="1"/><c/></root>"#);

        doc.set_text(root, "lead");
        assert_eq!(doc.to_xml_string(), r#"<root>lead<a/><b x="1"/><c/></root>"#);
        doc.detach(b);
        assert!(!doc.is_attached(b));
        assert_eq!(doc.to_xml_string(), r#"<root>lead<a/><c/></root>"#);
    }

    #[test]
    fn test_deep_nesting_round_trip() {
        let depth = 20_000;
        let xml = format!("<r>{}t{}</r>", "<d k=\"v\">".repeat(depth), "</d>".repeat(depth));
        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.to_xml_string(), xml);

        let mut target = XmlDocument::parse(b"<host/>").unwrap();
        let host = target.document_element().unwrap();
        let copied = target.import(&doc, doc.document_element().unwrap());
        target.append_child(host, copied);
        assert_eq!(target.node_to_string(copied), xml);
        assert_eq!(target.text_content(host), "t");
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        let doc = XmlDocument::parse(br#"<a xmlns="urn:x"><b xmlns=""/></a>"#).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.children(a)[0];
        assert_eq!(doc.element_namespace(a), Some("urn:x"));
        assert_eq!(doc.element_namespace(b), None);
    }
}
