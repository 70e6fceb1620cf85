/// Part names within an OPC package.
///
/// A PackURI is the absolute, slash-separated name of a part (for example
/// `/ppt/slides/slide1.xml`). The ZIP member name is the same string without
/// the leading slash.
use crate::opc::error::{PackageError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    /// Create a PackURI from an absolute part name.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(PackageError::InvalidPartName(format!(
                "part name must begin with '/', got '{}'",
                uri
            )));
        }
        if uri.len() > 1 && (uri.ends_with('/') || uri.contains("//")) {
            return Err(PackageError::InvalidPartName(uri));
        }
        Ok(PackURI { uri })
    }

    /// Create a PackURI from a ZIP member name or a part name with or without
    /// the leading slash.
    pub fn from_member(name: &str) -> Result<Self> {
        let name = name.replace('\\', "/");
        if name.starts_with('/') {
            Self::new(name)
        } else {
            Self::new(format!("/{}", name))
        }
    }

    /// Resolve a relationship target relative to `base_uri` (for example
    /// `../media/image1.png` against `/ppt/slides`).
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        if relative_ref.starts_with('/') {
            return Self::new(normalize_path(relative_ref));
        }
        let joined = if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };
        Self::new(normalize_path(&joined))
    }

    /// Directory portion, `/ppt/slides` for `/ppt/slides/slide1.xml`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    pub fn filename(&self) -> &str {
        self.uri.rfind('/').map_or("", |pos| &self.uri[pos + 1..])
    }

    /// Extension without the leading period.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        filename.rfind('.').map_or("", |pos| &filename[pos + 1..])
    }

    /// ZIP member name (no leading slash).
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// The relationships part for this part, `/word/_rels/document.xml.rels`
    /// for `/word/document.xml`.
    pub fn rels_uri(&self) -> Result<PackURI> {
        let base_uri = self.base_uri();
        if base_uri == "/" {
            Self::new(format!("/_rels/{}.rels", self.filename()))
        } else {
            Self::new(format!("{}/_rels/{}.rels", base_uri, self.filename()))
        }
    }

    /// Match against a part pattern in which `*` stands for any run of
    /// characters within one path segment. Leading slashes are optional on
    /// both sides.
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = pattern.trim_start_matches('/');
        let name = self.membername();
        let pattern_segments: Vec<&str> = pattern.split('/').collect();
        let name_segments: Vec<&str> = name.split('/').collect();
        pattern_segments.len() == name_segments.len()
            && pattern_segments
                .iter()
                .zip(&name_segments)
                .all(|(p, n)| segment_matches(p.as_bytes(), n.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

fn segment_matches(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => (0..=name.len()).any(|i| segment_matches(rest, &name[i..])),
        Some((c, rest)) => name.first() == Some(c) && segment_matches(rest, &name[1..]),
    }
}

/// Resolve `.` and `..` segments.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// Package-level relationships part.
pub const PACKAGE_RELS_URI: &str = "/_rels/.rels";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packuri_new() {
        assert!(PackURI::new("/word/document.xml").is_ok());
        assert!(PackURI::new("word/document.xml").is_err());
        assert!(PackURI::new("/word//document.xml").is_err());
        assert_eq!(PackURI::from_member("word/document.xml").unwrap().as_str(), "/word/document.xml");
    }

    #[test]
    fn test_components() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.base_uri(), "/ppt/slides");
        assert_eq!(uri.filename(), "slide1.xml");
        assert_eq!(uri.ext(), "xml");
        assert_eq!(uri.membername(), "ppt/slides/slide1.xml");
        assert_eq!(uri.rels_uri().unwrap().as_str(), "/ppt/slides/_rels/slide1.xml.rels");

        let ct = PackURI::new(CONTENT_TYPES_URI).unwrap();
        assert_eq!(ct.base_uri(), "/");
    }

    #[test]
    fn test_from_rel_ref() {
        let uri = PackURI::from_rel_ref("/ppt/slides", "../slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/slideLayouts/slideLayout1.xml");
        let uri = PackURI::from_rel_ref("/", "word/document.xml").unwrap();
        assert_eq!(uri.as_str(), "/word/document.xml");
        let uri = PackURI::from_rel_ref("/ppt", "/ppt/presentation.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/presentation.xml");
    }

    #[test]
    fn test_wildcard_matching() {
        let uri = PackURI::new("/ppt/slides/slide12.xml").unwrap();
        assert!(uri.matches("ppt/slides/*.xml"));
        assert!(uri.matches("/ppt/slides/slide*.xml"));
        assert!(uri.matches("ppt/*/slide12.xml"));
        assert!(!uri.matches("ppt/*.xml"));
        assert!(!uri.matches("ppt/slides/*.rels"));
        assert!(uri.matches("ppt/slides/slide12.xml"));
    }
}
