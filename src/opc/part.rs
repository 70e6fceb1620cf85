/// Parts of an OPC package.
///
/// A part keeps the bytes it was loaded with until it is mutated. XML parts
/// parse lazily into an [`XmlDocument`] on first access; once a caller takes
/// mutable access to the tree the part is marked dirty and its bytes are
/// re-serialized from the tree on save. Clean parts are never re-serialized.
use crate::opc::error::{PackageError, Result};
use crate::opc::packuri::PackURI;
use crate::xml::XmlDocument;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Eligible for XPath mutation.
    Xml,
    /// Media, embeddings and anything else round-tripped byte-for-byte.
    Binary,
}

#[derive(Debug, Clone)]
pub struct PackagePart {
    partname: PackURI,
    content_type: Option<String>,
    kind: PartKind,
    /// Bytes as loaded; shared with snapshots
    blob: Arc<[u8]>,
    tree: OnceCell<XmlDocument>,
    dirty: bool,
    /// Index of the entry in the source archive, for raw copies on save
    source_index: Option<usize>,
}

impl PackagePart {
    pub fn new(partname: PackURI, content_type: Option<String>, kind: PartKind, blob: Vec<u8>) -> Self {
        Self {
            partname,
            content_type,
            kind,
            blob: Arc::from(blob),
            tree: OnceCell::new(),
            dirty: false,
            source_index: None,
        }
    }

    pub(crate) fn with_source_index(mut self, index: usize) -> Self {
        self.source_index = Some(index);
        self
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// Archive path without the leading slash, e.g. `ppt/slides/slide1.xml`.
    #[inline]
    pub fn path(&self) -> &str {
        self.partname.membername()
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[inline]
    pub fn kind(&self) -> PartKind {
        self.kind
    }

    #[inline]
    pub fn is_xml(&self) -> bool {
        self.kind == PartKind::Xml
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn source_index(&self) -> Option<usize> {
        self.source_index
    }

    /// Whether the tree has been parsed.
    #[inline]
    pub fn is_parsed(&self) -> bool {
        self.tree.get().is_some()
    }

    /// Current content: the loaded bytes, or the serialized tree if dirty.
    pub fn blob(&self) -> Cow<'_, [u8]> {
        match (self.dirty, self.tree.get()) {
            (true, Some(tree)) => Cow::Owned(tree.to_xml_bytes()),
            _ => Cow::Borrowed(&self.blob),
        }
    }

    /// Parsed XML tree, parsing on first access.
    pub fn xml(&self) -> Result<&XmlDocument> {
        if self.kind != PartKind::Xml {
            return Err(PackageError::InvalidPartName(format!(
                "{} is not an XML part",
                self.partname
            )));
        }
        self.tree.get_or_try_init(|| {
            tracing::debug!(part = %self.partname, "parsing part");
            XmlDocument::parse(&self.blob).map_err(|e| PackageError::xml(self.path(), e))
        })
    }

    /// Mutable XML tree. Marks the part dirty.
    pub fn xml_mut(&mut self) -> Result<&mut XmlDocument> {
        self.xml()?;
        self.dirty = true;
        self.tree
            .get_mut()
            .ok_or_else(|| PackageError::PartNotFound(self.partname.to_string()))
    }

    /// Replace the part content wholesale; any parsed tree is discarded.
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = Arc::from(blob);
        self.tree = OnceCell::new();
        self.dirty = true;
        self.source_index = None;
    }

    /// Fold a dirty tree back into bytes so the part reads as loaded content.
    pub(crate) fn flush(&mut self) {
        if self.dirty
            && let Some(tree) = self.tree.get()
        {
            self.blob = Arc::from(tree.to_xml_bytes());
            self.source_index = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(xml: &str) -> PackagePart {
        PackagePart::new(
            PackURI::new("/word/document.xml").unwrap(),
            None,
            PartKind::Xml,
            xml.as_bytes().to_vec(),
        )
    }

    #[test]
    fn test_lazy_parse_and_dirty_tracking() {
        let mut p = part("<a><b/></a>");
        assert!(!p.is_parsed());
        assert_eq!(p.xml().unwrap().children(p.xml().unwrap().root()).len(), 1);
        assert!(p.is_parsed());
        assert!(!p.is_dirty());

        let doc = p.xml_mut().unwrap();
        let root = doc.document_element().unwrap();
        doc.element_mut(root).unwrap().set_attribute(crate::xml::QName::parse("x"), "1");
        assert!(p.is_dirty());
        assert_eq!(&*p.blob(), br#"<a x="1"><b/></a>"#.as_slice());
    }

    #[test]
    fn test_clean_part_returns_original_bytes() {
        let xml = "<a   ><b/></a>";
        let p = part(xml);
        p.xml().unwrap();
        assert_eq!(&*p.blob(), xml.as_bytes());
    }

    #[test]
    fn test_binary_part_has_no_tree() {
        let p = PackagePart::new(
            PackURI::new("/ppt/media/image1.png").unwrap(),
            Some("image/png".into()),
            PartKind::Binary,
            vec![0x89, b'P', b'N', b'G'],
        );
        assert!(p.xml().is_err());
    }

    #[test]
    fn test_malformed_xml_reports_part() {
        let p = part("<a>");
        let err = p.xml().unwrap_err();
        assert!(matches!(err, PackageError::Xml { ref part, .. } if part == "word/document.xml"));
    }
}
