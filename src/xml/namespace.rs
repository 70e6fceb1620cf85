//! Well-known OOXML namespaces and prefix scopes.
//!
//! Patch documents may use the conventional OOXML prefixes (`a`, `p`, `w`,
//! `x`, `r`, ...) without declaring them. A [`NamespaceMap`] starts from that
//! table and layers patch-level and operation-level declarations on top.

use indexmap::IndexMap;
use phf::{Map, phf_map};

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const PRESENTATIONML_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const WORDPROCESSINGML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const OFFICE_REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
pub const MARKUP_COMPAT_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// Conventional prefix to namespace URI.
static PREFIX_TO_URI: Map<&'static str, &'static str> = phf_map! {
    "a" => "http://schemas.openxmlformats.org/drawingml/2006/main",
    "p" => "http://schemas.openxmlformats.org/presentationml/2006/main",
    "w" => "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    "x" => "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    "r" => "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    "c" => "http://schemas.openxmlformats.org/drawingml/2006/chart",
    "pic" => "http://schemas.openxmlformats.org/drawingml/2006/picture",
    "wp" => "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    "mc" => "http://schemas.openxmlformats.org/markup-compatibility/2006",
    "rel" => "http://schemas.openxmlformats.org/package/2006/relationships",
    "ct" => "http://schemas.openxmlformats.org/package/2006/content-types",
    "cp" => "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
    "dc" => "http://purl.org/dc/elements/1.1/",
    "dcterms" => "http://purl.org/dc/terms/",
    "xsi" => "http://www.w3.org/2001/XMLSchema-instance",
    "vt" => "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes",
    "ep" => "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
    "w14" => "http://schemas.microsoft.com/office/word/2010/wordml",
    "p14" => "http://schemas.microsoft.com/office/powerpoint/2010/main",
    "a14" => "http://schemas.microsoft.com/office/drawing/2010/main",
    "x14ac" => "http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac",
    "m" => "http://schemas.openxmlformats.org/officeDocument/2006/math",
    "v" => "urn:schemas-microsoft-com:vml",
    "o" => "urn:schemas-microsoft-com:office:office",
    "xml" => "http://www.w3.org/XML/1998/namespace",
};

/// Namespace URI to the canonical prefix used by the normalizer.
static URI_TO_PREFIX: Map<&'static str, &'static str> = phf_map! {
    "http://schemas.openxmlformats.org/drawingml/2006/main" => "a",
    "http://schemas.openxmlformats.org/presentationml/2006/main" => "p",
    "http://schemas.openxmlformats.org/wordprocessingml/2006/main" => "w",
    "http://schemas.openxmlformats.org/spreadsheetml/2006/main" => "x",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships" => "r",
    "http://schemas.openxmlformats.org/drawingml/2006/chart" => "c",
    "http://schemas.openxmlformats.org/drawingml/2006/picture" => "pic",
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" => "wp",
    "http://schemas.openxmlformats.org/markup-compatibility/2006" => "mc",
    "http://schemas.openxmlformats.org/package/2006/relationships" => "rel",
    "http://schemas.openxmlformats.org/package/2006/content-types" => "ct",
    "http://schemas.openxmlformats.org/package/2006/metadata/core-properties" => "cp",
    "http://purl.org/dc/elements/1.1/" => "dc",
    "http://purl.org/dc/terms/" => "dcterms",
    "http://www.w3.org/2001/XMLSchema-instance" => "xsi",
    "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes" => "vt",
    "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" => "ep",
    "http://schemas.microsoft.com/office/word/2010/wordml" => "w14",
    "http://schemas.microsoft.com/office/powerpoint/2010/main" => "p14",
    "http://schemas.microsoft.com/office/drawing/2010/main" => "a14",
    "http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac" => "x14ac",
    "http://schemas.openxmlformats.org/officeDocument/2006/math" => "m",
    "urn:schemas-microsoft-com:vml" => "v",
    "urn:schemas-microsoft-com:office:office" => "o",
    "http://www.w3.org/XML/1998/namespace" => "xml",
};

/// URI bound to a conventional OOXML prefix.
#[inline]
pub fn builtin_namespace(prefix: &str) -> Option<&'static str> {
    PREFIX_TO_URI.get(prefix).copied()
}

/// Canonical prefix for a well-known namespace URI.
#[inline]
pub fn canonical_prefix(uri: &str) -> Option<&'static str> {
    URI_TO_PREFIX.get(uri).copied()
}

/// Prefix-to-URI bindings used to evaluate XPath and bind fragment prefixes.
///
/// An empty-string key binds the default element namespace for unprefixed
/// XPath names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceMap {
    entries: IndexMap<String, String>,
}

impl NamespaceMap {
    /// An empty map with no builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// A map preloaded with every conventional OOXML prefix.
    pub fn with_builtins() -> Self {
        let mut entries: IndexMap<String, String> = PREFIX_TO_URI
            .entries()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect();
        entries.sort_keys();
        Self { entries }
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.entries.insert(prefix.into(), uri.into());
    }

    /// Layer `other` on top of this map; its bindings win.
    pub fn extend_from(&mut self, other: &NamespaceMap) {
        for (p, u) in &other.entries {
            self.entries.insert(p.clone(), u.clone());
        }
    }

    /// Copy with `overrides` layered on top.
    pub fn overlay<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut out = self.clone();
        for (p, u) in overrides {
            out.entries.insert(p.clone(), u.clone());
        }
        out
    }

    #[inline]
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    /// Default element namespace for unprefixed names, when bound.
    #[inline]
    pub fn default_namespace(&self) -> Option<&str> {
        self.get("").filter(|u| !u.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NamespaceMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_agree() {
        for (prefix, uri) in PREFIX_TO_URI.entries() {
            assert_eq!(canonical_prefix(uri), Some(*prefix));
        }
        assert_eq!(builtin_namespace("a"), Some(DRAWINGML_NS));
        assert_eq!(builtin_namespace("zz"), None);
    }

    #[test]
    fn test_overlay_wins() {
        let base = NamespaceMap::with_builtins();
        let mut extra = IndexMap::new();
        extra.insert("a".to_string(), "urn:custom".to_string());
        let merged = base.overlay(&extra);
        assert_eq!(merged.get("a"), Some("urn:custom"));
        assert_eq!(merged.get("p"), Some(PRESENTATIONML_NS));
        assert_eq!(merged.default_namespace(), None);
    }
}
