//! Relationship parts (`*.rels`).

use crate::opc::constants::target_mode;
use crate::opc::error::{PackageError, Result};
use crate::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub r_id: String,
    /// Relationship type URI
    pub reltype: String,
    /// Target reference, relative to the source part's directory unless external
    pub target_ref: String,
    pub is_external: bool,
}

impl Relationship {
    /// Resolve the target of an internal relationship to a part name.
    pub fn target_partname(&self, base_uri: &str) -> Result<PackURI> {
        if self.is_external {
            return Err(PackageError::InvalidPartName(format!(
                "relationship {} targets an external resource",
                self.r_id
            )));
        }
        PackURI::from_rel_ref(base_uri, &self.target_ref)
    }
}

pub type Relationships = SmallVec<[Relationship; 8]>;

/// Parse a relationships part.
pub fn parse_relationships(xml: &[u8]) -> Result<Relationships> {
    let mut rels = Relationships::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut rel = Relationship {
                        r_id: String::new(),
                        reltype: String::new(),
                        target_ref: String::new(),
                        is_external: false,
                    };
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| PackageError::InvalidPackage(err.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::InvalidPackage(err.to_string()))?
                            .to_string();
                        match attr.key.as_ref() {
                            b"Id" => rel.r_id = value,
                            b"Type" => rel.reltype = value,
                            b"Target" => rel.target_ref = value,
                            b"TargetMode" => rel.is_external = value == target_mode::EXTERNAL,
                            _ => {},
                        }
                    }
                    rels.push(rel);
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PackageError::InvalidPackage(format!(
                    "relationships parse error: {}",
                    e
                )));
            },
            _ => {},
        }
        buf.clear();
    }

    Ok(rels)
}
