//! Carrier definitions: where a design token lands in a document.

use super::error::{CarrierError, Result};
use crate::opc::DocumentKind;
use crate::xml::{NamespaceMap, XmlDocument};
use crate::xml::xpath::XPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Office suite that will consume the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Office,
    #[serde(rename = "libreoffice")]
    LibreOffice,
    GoogleWorkspace,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Office, Platform::LibreOffice, Platform::GoogleWorkspace];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Office => "office",
            Platform::LibreOffice => "libreoffice",
            Platform::GoogleWorkspace => "google_workspace",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "office" | "microsoft_office" => Ok(Platform::Office),
            "libreoffice" => Ok(Platform::LibreOffice),
            "google_workspace" | "google" => Ok(Platform::GoogleWorkspace),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// Class of document element a carrier styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementFamily {
    /// Theme color and font schemes
    Theme,
    /// Title placeholder text
    Title,
    /// Body placeholder text
    Body,
    /// Run defaults of a word-processing document
    DocumentDefaults,
    /// Default cell font of a workbook
    WorkbookDefaults,
}

/// One token-to-target binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Dotted token id
    pub token: String,
    /// XPath relative to each base template, or absolute when it starts
    /// with `/`
    pub target: String,
}

impl Mapping {
    pub fn new(token: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierDefinition {
    pub id: String,
    pub family: ElementFamily,
    pub document: DocumentKind,
    /// Part path pattern; `*` matches within one segment
    pub part: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub namespaces: IndexMap<String, String>,
    /// Base XPath templates per platform
    pub templates: IndexMap<Platform, Vec<String>>,
    pub mappings: Vec<Mapping>,
    /// Token holding the background color that text colors are checked against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl CarrierDefinition {
    pub fn supports(&self, platform: Platform) -> bool {
        self.templates.get(&platform).is_some_and(|t| !t.is_empty())
    }

    pub fn namespace_map(&self) -> NamespaceMap {
        NamespaceMap::with_builtins().overlay(&self.namespaces)
    }

    /// Concrete XPath targets for `mapping` on `platform`.
    pub fn targets(&self, mapping: &Mapping, platform: Platform) -> Vec<String> {
        if mapping.target.starts_with('/') {
            return vec![mapping.target.clone()];
        }
        self.templates
            .get(&platform)
            .map(|bases| {
                bases
                    .iter()
                    .map(|base| format!("{}/{}", base.trim_end_matches('/'), mapping.target))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check that every expanded target is a parseable XPath with bound
    /// prefixes.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CarrierError::Load("carrier without an id".to_string()));
        }
        if self.templates.is_empty() {
            return Err(self.invalid("no platform templates"));
        }
        let ns = self.namespace_map();
        let empty = XmlDocument::new();
        for platform in self.templates.keys() {
            for mapping in &self.mappings {
                for target in self.targets(mapping, *platform) {
                    XPath::parse(&target)
                        .and_then(|xpath| xpath.select(&empty, &ns))
                        .map_err(|e| self.invalid(format!("target '{}': {}", target, e)))?;
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> CarrierError {
        CarrierError::Invalid {
            id: self.id.clone(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme_fonts() -> CarrierDefinition {
        CarrierDefinition {
            id: "fonts".into(),
            family: ElementFamily::Theme,
            document: DocumentKind::Presentation,
            part: "ppt/theme/theme*.xml".into(),
            description: None,
            namespaces: IndexMap::new(),
            templates: IndexMap::from([(
                Platform::Office,
                vec!["/a:theme/a:themeElements/a:fontScheme".to_string()],
            )]),
            mappings: vec![
                Mapping::new("font.heading", "a:majorFont/a:latin/@typeface"),
                Mapping::new("font.any", "//a:latin/@typeface"),
            ],
            background: None,
        }
    }

    #[test]
    fn test_targets_join_base() {
        let def = theme_fonts();
        assert_eq!(
            def.targets(&def.mappings[0], Platform::Office),
            ["/a:theme/a:themeElements/a:fontScheme/a:majorFont/a:latin/@typeface"]
        );
        assert_eq!(def.targets(&def.mappings[1], Platform::Office), ["//a:latin/@typeface"]);
        assert!(def.targets(&def.mappings[0], Platform::LibreOffice).is_empty());
        assert!(def.supports(Platform::Office));
        assert!(!def.supports(Platform::GoogleWorkspace));
    }

    #[test]
    fn test_validate() {
        assert!(theme_fonts().validate().is_ok());
        let mut bad = theme_fonts();
        bad.mappings.push(Mapping::new("x", "zz:thing/@val"));
        assert!(matches!(bad.validate(), Err(CarrierError::Invalid { .. })));
    }

    #[test]
    fn test_platform_names() {
        assert_eq!("LibreOffice".parse::<Platform>(), Ok(Platform::LibreOffice));
        assert_eq!("google-workspace".parse::<Platform>(), Ok(Platform::GoogleWorkspace));
        assert_eq!(Platform::GoogleWorkspace.to_string(), "google_workspace");
    }
}
