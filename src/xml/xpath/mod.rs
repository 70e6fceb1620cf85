//! XPath 1.0 selection over [`XmlDocument`] trees.
//!
//! Supports the full expression grammar (location paths, predicates, unions,
//! arithmetic, comparisons) with the common axes and core function library.
//! Variables and namespace nodes are not supported.
//!
//! Prefixes in name tests resolve through a [`NamespaceMap`], never through
//! the document's own declarations, so a selector means the same thing no
//! matter which prefixes a part happens to use. Unprefixed element names match
//! the null namespace unless the map binds the empty prefix.
//!
//! ```
//! use kumquat::xml::{NamespaceMap, XmlDocument, XPath};
//!
//! let doc = XmlDocument::parse(br#"<a:p xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:r/><a:r/></a:p>"#).unwrap();
//! let xpath = XPath::parse("//a:r[2]").unwrap();
//! let hits = xpath.select(&doc, &NamespaceMap::with_builtins()).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::{Value, XNode};

use crate::xml::dom::{NodeId, XmlDocument};
use crate::xml::namespace::NamespaceMap;
use parser::Expr;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("XPath syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("namespace prefix '{0}' is not declared")]
    UnboundPrefix(String),

    #[error("unknown XPath function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s)")]
    Arity { name: String, expected: String },

    #[error("XPath type error: {0}")]
    Type(String),

    #[error("XPath variables are not supported: ${0}")]
    UnsupportedVariable(String),
}

impl XPathError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        XPathError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Compile `source`, reporting syntax errors with their byte offset.
    pub fn parse(source: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with the document node as context.
    pub fn evaluate(&self, doc: &XmlDocument, namespaces: &NamespaceMap) -> Result<Value, XPathError> {
        self.evaluate_at(doc, doc.root(), namespaces)
    }

    /// Evaluate with `context` as the context node.
    pub fn evaluate_at(
        &self,
        doc: &XmlDocument,
        context: NodeId,
        namespaces: &NamespaceMap,
    ) -> Result<Value, XPathError> {
        eval::Evaluator::new(doc, namespaces).evaluate(&self.expr, XNode::Node(context))
    }

    /// Evaluate and require a node-set, returned in document order.
    pub fn select(&self, doc: &XmlDocument, namespaces: &NamespaceMap) -> Result<Vec<XNode>, XPathError> {
        match self.evaluate(doc, namespaces)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::Type(format!(
                "expression '{}' evaluates to a {}, not a node-set",
                self.source,
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for XPath {
    type Err = XPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPath::parse(s)
    }
}
