//! Content type discovery from `[Content_Types].xml`.

use crate::opc::constants::content_type;
use crate::opc::error::{PackageError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Content type map for looking up content types by part name or extension.
///
/// Implements the OPC discovery algorithm: an `Override` for the exact part
/// name wins, otherwise the `Default` for the (case-insensitive) extension.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeMap {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `[Content_Types].xml`.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let key_attr: Option<&[u8]> = match e.local_name().as_ref() {
                        b"Default" => Some(b"Extension".as_slice()),
                        b"Override" => Some(b"PartName".as_slice()),
                        _ => None,
                    };
                    if let Some(key_attr) = key_attr {
                        let mut key = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|err| content_types_error(err.to_string()))?;
                            let value = attr
                                .unescape_value()
                                .map_err(|err| content_types_error(err.to_string()))?
                                .to_string();
                            if attr.key.as_ref() == key_attr {
                                key = Some(value);
                            } else if attr.key.as_ref() == b"ContentType" {
                                content_type = Some(value);
                            }
                        }

                        if let (Some(key), Some(ct)) = (key, content_type) {
                            if key_attr == b"Extension" {
                                map.add_default(&key, ct);
                            } else {
                                map.add_override(&key, ct);
                            }
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(content_types_error(e.to_string())),
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    pub fn add_default(&mut self, extension: &str, content_type: String) {
        self.defaults.insert(extension.to_ascii_lowercase(), content_type);
    }

    pub fn add_override(&mut self, partname: &str, content_type: String) {
        self.overrides.insert(partname.to_ascii_lowercase(), content_type);
    }

    /// Content type for a part, if the map declares one.
    pub fn get(&self, uri: &PackURI) -> Option<&str> {
        self.overrides
            .get(&uri.as_str().to_ascii_lowercase())
            .or_else(|| self.defaults.get(&uri.ext().to_ascii_lowercase()))
            .map(String::as_str)
    }
}

fn content_types_error(message: String) -> PackageError {
    PackageError::InvalidPackage(format!("{}: {}", CONTENT_TYPES_URI, message))
}

/// Whether a part holds XML that patches may address.
///
/// Uses the declared content type when present (`+xml` suffixes and the
/// generic XML types), falling back to the `.xml`/`.rels` extension.
pub fn is_xml_part(uri: &PackURI, declared: Option<&str>) -> bool {
    if uri.as_str() == CONTENT_TYPES_URI {
        return true;
    }
    match declared {
        Some(ct) => {
            ct.ends_with("+xml") || ct == content_type::XML || ct == content_type::TEXT_XML
        },
        None => matches!(uri.ext().to_ascii_lowercase().as_str(), "xml" | "rels"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="PNG" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.template.main+xml"/></Types>"#;

    #[test]
    fn test_override_then_default() {
        let map = ContentTypeMap::from_xml(CT.as_bytes()).unwrap();
        let pres = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(map.get(&pres), Some(content_type::PML_TEMPLATE_MAIN));
        let other = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(map.get(&other), Some("application/xml"));
        let media = PackURI::new("/ppt/media/image1.png").unwrap();
        assert_eq!(map.get(&media), Some("image/png"));
        assert_eq!(map.get(&PackURI::new("/x.bin").unwrap()), None);
    }

    #[test]
    fn test_xml_classification() {
        let slide = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert!(is_xml_part(&slide, Some(content_type::PML_SLIDE)));
        let media = PackURI::new("/ppt/media/image1.png").unwrap();
        assert!(!is_xml_part(&media, Some("image/png")));
        let vml = PackURI::new("/xl/drawings/vmlDrawing1.vml").unwrap();
        assert!(!is_xml_part(&vml, Some("application/vnd.openxmlformats-officedocument.vmlDrawing")));
        assert!(is_xml_part(&PackURI::new("/_rels/.rels").unwrap(), None));
    }
}
