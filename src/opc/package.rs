/// In-memory OPC packages.
///
/// A [`Package`] holds every entry of the source archive as a
/// [`PackagePart`], keyed by its ZIP member name in archive order. XML parts
/// are parsed lazily; binary parts are never interpreted. Saving raw-copies
/// every untouched entry from the source archive, so their compressed bytes
/// survive unchanged, and re-serializes only dirty parts.
use crate::opc::constants::{content_type, relationship_type};
use crate::opc::content_types::{ContentTypeMap, is_xml_part};
use crate::opc::error::{PackageError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_RELS_URI, PackURI};
use crate::opc::part::{PackagePart, PartKind};
use crate::opc::rel::parse_relationships;
use crate::xml::XmlDocument;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Compression applied to entries rewritten on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Presentation,
    Document,
    Spreadsheet,
}

/// Concrete package format, distinguishing templates from regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pptx,
    Potx,
    Docx,
    Dotx,
    Xlsx,
    Xltx,
}

impl DocumentFormat {
    pub fn kind(self) -> DocumentKind {
        match self {
            DocumentFormat::Pptx | DocumentFormat::Potx => DocumentKind::Presentation,
            DocumentFormat::Docx | DocumentFormat::Dotx => DocumentKind::Document,
            DocumentFormat::Xlsx | DocumentFormat::Xltx => DocumentKind::Spreadsheet,
        }
    }

    pub fn is_template(self) -> bool {
        matches!(
            self,
            DocumentFormat::Potx | DocumentFormat::Dotx | DocumentFormat::Xltx
        )
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Potx => "potx",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Dotx => "dotx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Xltx => "xltx",
        }
    }

    /// Format for a main-part content type.
    pub fn from_content_type(ct: &str) -> Option<Self> {
        Some(match ct {
            content_type::PML_PRESENTATION_MAIN => DocumentFormat::Pptx,
            content_type::PML_TEMPLATE_MAIN => DocumentFormat::Potx,
            content_type::WML_DOCUMENT_MAIN => DocumentFormat::Docx,
            content_type::WML_TEMPLATE_MAIN => DocumentFormat::Dotx,
            content_type::SML_SHEET_MAIN => DocumentFormat::Xlsx,
            content_type::SML_TEMPLATE_MAIN => DocumentFormat::Xltx,
            _ => return None,
        })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pptx" => Ok(DocumentFormat::Pptx),
            "potx" => Ok(DocumentFormat::Potx),
            "docx" => Ok(DocumentFormat::Docx),
            "dotx" => Ok(DocumentFormat::Dotx),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "xltx" => Ok(DocumentFormat::Xltx),
            other => Err(format!("unknown document format '{}'", other)),
        }
    }
}

pub struct Package {
    path: Option<PathBuf>,
    id: Uuid,
    /// Source archive, kept for raw copies of untouched entries
    source: Option<Arc<[u8]>>,
    /// Parts keyed by ZIP member name, in archive order
    parts: IndexMap<String, PackagePart>,
    content_types: ContentTypeMap,
    compression: Compression,
}

/// Lock key of the package file at `path`, usable before it is opened.
pub fn file_lock_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

impl Package {
    /// Open a package from a file.
    ///
    /// # Example
    /// ```no_run
    /// use kumquat::opc::Package;
    ///
    /// let pkg = Package::open("brand.potx").unwrap();
    /// println!("{:?}", pkg.format());
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut package = Self::from_bytes(data)?;
        package.path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), parts = package.parts.len(), "package opened");
        Ok(package)
    }

    /// Load a package from archive bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let source: Arc<[u8]> = Arc::from(data);
        let mut archive = zip::ZipArchive::new(Cursor::new(&source[..]))
            .map_err(|e| PackageError::InvalidPackage(e.to_string()))?;

        let mut raw: Vec<(usize, String, Vec<u8>)> = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| PackageError::InvalidPackage(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| PackageError::InvalidPackage(format!("{}: {}", name, e)))?;
            raw.push((index, name, data));
        }

        let content_types = raw
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(&CONTENT_TYPES_URI[1..]))
            .map(|(_, _, data)| ContentTypeMap::from_xml(data))
            .ok_or_else(|| PackageError::MissingPart(CONTENT_TYPES_URI.to_string()))??;

        let mut parts = IndexMap::with_capacity(raw.len());
        for (index, name, data) in raw {
            let partname = PackURI::from_member(&name)
                .map_err(|_| PackageError::InvalidPackage(format!("bad entry name '{}'", name)))?;
            let declared = content_types.get(&partname).map(str::to_string);
            let kind = if is_xml_part(&partname, declared.as_deref()) {
                PartKind::Xml
            } else {
                PartKind::Binary
            };
            let key = partname.membername().to_string();
            let part = PackagePart::new(partname, declared, kind, data).with_source_index(index);
            parts.insert(key, part);
        }

        Ok(Self {
            path: None,
            id: Uuid::new_v4(),
            source: Some(source),
            parts,
            content_types,
            compression: Compression::default(),
        })
    }

    /// File the package was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Identity used to serialize transactions: the canonical file path, or
    /// a per-instance key for in-memory packages.
    pub fn lock_key(&self) -> String {
        match &self.path {
            Some(path) => file_lock_key(path),
            None => format!("mem:{}", self.id),
        }
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn content_types(&self) -> &ContentTypeMap {
        &self.content_types
    }

    /// Look up a part by member name; a leading slash is accepted.
    pub fn part(&self, path: &str) -> Option<&PackagePart> {
        self.parts.get(path.trim_start_matches('/'))
    }

    pub fn part_mut(&mut self, path: &str) -> Option<&mut PackagePart> {
        self.parts.get_mut(path.trim_start_matches('/'))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path.trim_start_matches('/'))
    }

    /// Parse (if needed) an XML part and apply `f` to its tree, marking the
    /// part dirty.
    pub fn mutate_part<T, F>(&mut self, path: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut XmlDocument) -> T,
    {
        let part = self
            .part_mut(path)
            .ok_or_else(|| PackageError::PartNotFound(path.to_string()))?;
        let tree = part.xml_mut()?;
        Ok(f(tree))
    }

    /// Member names of every part, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Member names of the parts eligible for XPath mutation.
    pub fn xml_part_names(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|(_, part)| part.is_xml())
            .map(|(name, _)| name.as_str())
    }

    pub fn parts(&self) -> impl Iterator<Item = &PackagePart> {
        self.parts.values()
    }

    /// Member name of the main document part, found through the package
    /// relationship of type `officeDocument`.
    pub fn main_document_part(&self) -> Option<&str> {
        let rels_part = self.part(PACKAGE_RELS_URI)?;
        let rels = parse_relationships(&rels_part.blob()).ok()?;
        let rel = rels
            .iter()
            .find(|r| r.reltype == relationship_type::OFFICE_DOCUMENT && !r.is_external)?;
        let target = rel.target_partname("/").ok()?;
        self.parts
            .get_key_value(target.membername())
            .map(|(name, _)| name.as_str())
    }

    /// Format of the package, from the main part's content type, falling back
    /// to the conventional main part locations.
    pub fn format(&self) -> Option<DocumentFormat> {
        if let Some(main) = self.main_document_part()
            && let Some(ct) = self.part(main).and_then(PackagePart::content_type)
            && let Some(format) = DocumentFormat::from_content_type(ct)
        {
            return Some(format);
        }
        if self.contains("ppt/presentation.xml") {
            Some(DocumentFormat::Pptx)
        } else if self.contains("word/document.xml") {
            Some(DocumentFormat::Docx)
        } else if self.contains("xl/workbook.xml") {
            Some(DocumentFormat::Xlsx)
        } else {
            None
        }
    }

    pub fn document_kind(&self) -> Option<DocumentKind> {
        self.format().map(DocumentFormat::kind)
    }

    /// Whether any part has been mutated since load.
    pub fn is_dirty(&self) -> bool {
        self.parts.values().any(PackagePart::is_dirty)
    }

    /// Copy of a part's current state, for rollback.
    pub(crate) fn snapshot_part(&self, path: &str) -> Option<PackagePart> {
        self.part(path).cloned()
    }

    /// Put back a part captured by [`Package::snapshot_part`]. Returns
    /// false if the part no longer exists.
    pub(crate) fn restore_part(&mut self, snapshot: PackagePart) -> bool {
        match self.parts.get_mut(snapshot.path()) {
            Some(slot) => {
                *slot = snapshot;
                true
            },
            None => false,
        }
    }

    /// Fold dirty trees into part bytes ahead of serialization.
    pub(crate) fn finalize(&mut self) {
        for part in self.parts.values_mut().filter(|p| p.is_dirty()) {
            part.flush();
        }
    }

    /// Write the package to a file.
    ///
    /// The archive is written to a sibling temporary file and renamed over
    /// `path`, so readers never observe a half-written package.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&staging)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            std::fs::rename(&staging, path)
        })();
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        tracing::info!(path = %path.display(), bytes = bytes.len(), "package saved");
        Ok(())
    }

    /// Serialize the package to archive bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn write_to<W: Write + Seek>(&self, out: W) -> Result<()> {
        let mut writer = ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(self.compression.method());
        let mut archive = match &self.source {
            Some(source) => Some(zip::ZipArchive::new(Cursor::new(&source[..]))?),
            None => None,
        };

        for (name, part) in &self.parts {
            match (part.is_dirty(), part.source_index(), archive.as_mut()) {
                (false, Some(index), Some(archive)) => {
                    writer.raw_copy_file(archive.by_index_raw(index)?)?;
                },
                _ => {
                    tracing::debug!(part = %name, "writing part");
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(&part.blob())?;
                },
            }
        }

        writer.finish()?;
        Ok(())
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("parts", &self.parts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::fixtures;

    fn entry_bytes(archive: &[u8], name: &str) -> Vec<u8> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_open_classifies_parts() {
        let pkg = Package::from_bytes(fixtures::minimal_potx()).unwrap();
        let xml: Vec<&str> = pkg.xml_part_names().collect();
        assert!(xml.contains(&"ppt/slides/slide1.xml"));
        assert!(xml.contains(&"_rels/.rels"));
        assert!(xml.contains(&"[Content_Types].xml"));
        assert!(!xml.contains(&"ppt/media/image1.png"));
        assert_eq!(pkg.part_names().count(), 7);
        assert_eq!(pkg.part("/ppt/media/image1.png").unwrap().kind(), PartKind::Binary);
    }

    #[test]
    fn test_main_part_and_format() {
        let pkg = Package::from_bytes(fixtures::minimal_potx()).unwrap();
        assert_eq!(pkg.main_document_part(), Some("ppt/presentation.xml"));
        assert_eq!(pkg.format(), Some(DocumentFormat::Potx));
        assert_eq!(pkg.document_kind(), Some(DocumentKind::Presentation));

        let doc = Package::from_bytes(fixtures::minimal_docx()).unwrap();
        assert_eq!(doc.format(), Some(DocumentFormat::Docx));
        assert!(!doc.format().unwrap().is_template());
    }

    #[test]
    fn test_not_a_zip() {
        let err = Package::from_bytes(b"definitely not a zip".to_vec()).unwrap_err();
        assert!(matches!(err, PackageError::InvalidPackage(_)));
    }

    #[test]
    fn test_missing_content_types() {
        let data = fixtures::build_zip(&[("word/document.xml", fixtures::DOCUMENT.as_bytes())]);
        let err = Package::from_bytes(data).unwrap_err();
        assert!(matches!(err, PackageError::MissingPart(_)));
    }

    #[test]
    fn test_untouched_round_trip_is_byte_identical() {
        let source = fixtures::minimal_potx();
        let pkg = Package::from_bytes(source.clone()).unwrap();
        // Parsing alone must not cause a rewrite.
        pkg.part("ppt/slides/slide1.xml").unwrap().xml().unwrap();
        let out = pkg.to_bytes().unwrap();
        for name in pkg.part_names() {
            assert_eq!(entry_bytes(&source, name), entry_bytes(&out, name), "{}", name);
        }
    }

    #[test]
    fn test_mutate_part_rewrites_only_that_part() {
        let source = fixtures::minimal_potx();
        let mut pkg = Package::from_bytes(source.clone()).unwrap();
        pkg.mutate_part("ppt/presentation.xml", |doc| {
            let root = doc.document_element().unwrap();
            let title = doc.element_children(root).last().unwrap();
            doc.element_mut(title)
                .unwrap()
                .set_attribute(crate::xml::QName::parse("text"), "New");
        })
        .unwrap();
        assert!(pkg.is_dirty());

        let out = pkg.to_bytes().unwrap();
        let presentation = String::from_utf8(entry_bytes(&out, "ppt/presentation.xml")).unwrap();
        assert!(presentation.contains(r#"<title text="New"/>"#));
        assert_eq!(entry_bytes(&out, "ppt/media/image1.png"), fixtures::PNG);
        assert_eq!(
            entry_bytes(&out, "ppt/slides/slide1.xml"),
            entry_bytes(&source, "ppt/slides/slide1.xml")
        );
    }

    #[test]
    fn test_mutate_missing_part() {
        let mut pkg = Package::from_bytes(fixtures::minimal_potx()).unwrap();
        let err = pkg.mutate_part("ppt/slides/slide9.xml", |_| ()).unwrap_err();
        assert!(matches!(err, PackageError::PartNotFound(_)));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut pkg = Package::from_bytes(fixtures::minimal_potx()).unwrap();
        let before = pkg.part("ppt/presentation.xml").unwrap().blob().into_owned();
        let snapshot = pkg.snapshot_part("ppt/presentation.xml").unwrap();
        pkg.mutate_part("ppt/presentation.xml", |doc| {
            let root = doc.document_element().unwrap();
            doc.detach(root);
        })
        .unwrap();
        pkg.restore_part(snapshot);
        let part = pkg.part("ppt/presentation.xml").unwrap();
        assert!(!part.is_dirty());
        assert_eq!(part.blob().as_ref(), before.as_slice());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.potx");
        std::fs::write(&path, fixtures::minimal_potx()).unwrap();

        let mut pkg = Package::open(&path).unwrap();
        assert!(pkg.lock_key().ends_with("deck.potx"));
        pkg.set_compression(Compression::Stored);
        pkg.mutate_part("ppt/slides/slide1.xml", |doc| {
            let root = doc.document_element().unwrap();
            doc.element_mut(root)
                .unwrap()
                .set_attribute(crate::xml::QName::parse("show"), "0");
        })
        .unwrap();
        let out = dir.path().join("out.potx");
        pkg.save(&out).unwrap();

        let reopened = Package::open(&out).unwrap();
        let slide = reopened.part("ppt/slides/slide1.xml").unwrap().xml().unwrap();
        let root = slide.document_element().unwrap();
        assert_eq!(
            slide.element(root).unwrap().attribute_by_name("show"),
            Some("0")
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("potx".parse::<DocumentFormat>(), Ok(DocumentFormat::Potx));
        assert_eq!(".XLTX".parse::<DocumentFormat>(), Ok(DocumentFormat::Xltx));
        assert!("odt".parse::<DocumentFormat>().is_err());
    }
}
