use super::builtin::builtin_carriers;
use super::definition::{CarrierDefinition, ElementFamily, Platform};
use super::error::{CarrierError, Result};
use crate::opc::DocumentKind;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Carrier definitions keyed by id.
///
/// Built once, then shared read-only (typically behind an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct CarrierRegistry {
    carriers: IndexMap<String, CarrierDefinition>,
}

#[derive(Deserialize)]
struct CarrierFile {
    carriers: Vec<CarrierDefinition>,
}

impl CarrierRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in carrier set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in builtin_carriers() {
            registry.carriers.insert(def.id.clone(), def);
        }
        registry
    }

    /// Parse carriers from YAML or JSON: either a list of definitions or a
    /// mapping with a `carriers` list.
    pub fn parse_definitions(text: &str) -> Result<Vec<CarrierDefinition>> {
        let head = text.trim_start();
        if head.starts_with("- ") || head.starts_with('[') {
            return serde_saphyr::from_str(text).map_err(|e| CarrierError::Load(e.to_string()));
        }
        let file: CarrierFile = serde_saphyr::from_str(text).map_err(|e| CarrierError::Load(e.to_string()))?;
        Ok(file.carriers)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_yaml(text)?;
        Ok(registry)
    }

    /// Add definitions from YAML; nothing is added if any is invalid.
    pub fn load_yaml(&mut self, text: &str) -> Result<usize> {
        let defs = Self::parse_definitions(text)?;
        for (i, def) in defs.iter().enumerate() {
            def.validate()?;
            if self.carriers.contains_key(&def.id) || defs[..i].iter().any(|d| d.id == def.id) {
                return Err(CarrierError::Duplicate(def.id.clone()));
            }
        }
        let count = defs.len();
        for def in defs {
            self.carriers.insert(def.id.clone(), def);
        }
        tracing::debug!(count, "carrier definitions loaded");
        Ok(count)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CarrierError::Load(format!("{}: {}", path.as_ref().display(), e)))?;
        self.load_yaml(&text)
    }

    pub fn register(&mut self, def: CarrierDefinition) -> Result<()> {
        def.validate()?;
        if self.carriers.contains_key(&def.id) {
            return Err(CarrierError::Duplicate(def.id));
        }
        self.carriers.insert(def.id.clone(), def);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&CarrierDefinition> {
        self.carriers.get(id)
    }

    /// Carriers for an element family that have templates for `platform`.
    pub fn find(&self, platform: Platform, family: ElementFamily) -> impl Iterator<Item = &CarrierDefinition> {
        self.carriers
            .values()
            .filter(move |c| c.family == family && c.supports(platform))
    }

    pub fn for_document(&self, kind: DocumentKind) -> impl Iterator<Item = &CarrierDefinition> {
        self.carriers.values().filter(move |c| c.document == kind)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.carriers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
carriers:
  - id: brand.chart
    family: body
    document: presentation
    part: "ppt/charts/chart*.xml"
    namespaces:
      ch: "http://schemas.openxmlformats.org/drawingml/2006/chart"
    templates:
      office:
        - "/ch:chartSpace/ch:txPr/a:p/a:pPr/a:defRPr"
      libreoffice:
        - "/ch:chartSpace/ch:txPr/a:p/a:pPr/a:defRPr"
    mappings:
      - token: typography.chart.size
        target: "@sz"
"#;

    #[test]
    fn test_builtin_lookup() {
        let registry = CarrierRegistry::builtin();
        assert!(registry.get("pptx.theme.colors").is_some());
        assert!(registry.get("nope").is_none());
        let themes: Vec<&str> = registry
            .find(Platform::LibreOffice, ElementFamily::Theme)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(themes, ["pptx.theme.colors", "pptx.theme.fonts"]);
        assert_eq!(registry.for_document(DocumentKind::Spreadsheet).count(), 1);
    }

    #[test]
    fn test_load_yaml() {
        let mut registry = CarrierRegistry::builtin();
        let before = registry.len();
        assert_eq!(registry.load_yaml(YAML).unwrap(), 1);
        assert_eq!(registry.len(), before + 1);

        let chart = registry.get("brand.chart").unwrap();
        assert!(chart.supports(Platform::LibreOffice));
        assert!(!chart.supports(Platform::GoogleWorkspace));
        assert_eq!(registry.find(Platform::GoogleWorkspace, ElementFamily::Body).count(), 1);

        assert!(matches!(registry.load_yaml(YAML), Err(CarrierError::Duplicate(_))));
    }

    #[test]
    fn test_load_rejects_bad_definitions() {
        assert!(matches!(CarrierRegistry::from_yaml("carriers: 3\n"), Err(CarrierError::Load(_))));
        let unbound = YAML.replace("ch: \"http", "c2: \"http");
        assert!(matches!(
            CarrierRegistry::from_yaml(&unbound),
            Err(CarrierError::Invalid { .. })
        ));
    }
}
