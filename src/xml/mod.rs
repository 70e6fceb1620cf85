//! XML tree, namespace handling, XPath selection, normalization and comparison.

pub mod compare;
pub mod dom;
pub mod error;
pub mod namespace;
pub mod normalize;
pub mod xpath;

pub use compare::{ComparisonResult, Difference, compare, compare_documents};
pub use dom::{Attribute, Element, NamespaceDecl, NodeId, NodeKind, QName, XmlDocument};
pub use error::XmlError;
pub use namespace::NamespaceMap;
pub use normalize::{normalize, normalize_document};
pub use xpath::{Value, XNode, XPath, XPathError};
