//! Writing resolved tokens into documents through carriers.

use super::definition::{CarrierDefinition, Mapping, Platform};
use super::error::{CarrierError, Result};
use super::registry::CarrierRegistry;
use crate::apply::Applier;
use crate::common::color::{self, RGBColor};
use crate::common::unit::{self, DEFAULT_BASE_POINTS, DEFAULT_BASELINE_GRID, DEFAULT_DPI};
use crate::common::value::format_number;
use crate::opc::Package;
use crate::patch::PatchOperation;
use crate::tokens::TokenValue;
use crate::xml::XmlDocument;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Value encoding expected at an XPath target, guessed from its last steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// DrawingML geometry in EMU (`@cx`, `@cy`, `@x`, `@y`)
    Emu,
    /// WordprocessingML `w:sz`
    HalfPoints,
    /// SpreadsheetML `x:sz`
    Points,
    /// DrawingML `@sz` on run properties
    Centipoints,
    Font,
    /// `RRGGBB`
    Color,
    /// SpreadsheetML `AARRGGBB`
    ArgbColor,
    Text,
}

impl TargetKind {
    pub fn classify(xpath: &str) -> Self {
        let mut steps = xpath.rsplit('/').filter(|s| !s.is_empty());
        let last = steps.next().unwrap_or("").to_ascii_lowercase();
        let parent = steps.next().unwrap_or("").to_ascii_lowercase();
        let tail = format!("{}/{}", parent, last);

        if matches!(last.as_str(), "@cx" | "@cy" | "@x" | "@y") {
            TargetKind::Emu
        } else if tail.contains("w:sz") {
            TargetKind::HalfPoints
        } else if tail.contains("x:sz") {
            TargetKind::Points
        } else if last == "@sz" {
            TargetKind::Centipoints
        } else if tail.contains("typeface") || tail.contains("rfonts") || tail.contains("x:name") {
            TargetKind::Font
        } else if last == "@rgb" {
            TargetKind::ArgbColor
        } else if tail.contains("clr") || tail.contains("color") {
            TargetKind::Color
        } else {
            TargetKind::Text
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, TargetKind::Color | TargetKind::ArgbColor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectionOptions {
    pub platform: Platform,
    pub base_font_pt: f64,
    pub dpi: u32,
    pub snap_to_baseline: bool,
    pub baseline_grid_emu: i64,
    /// Check text colors against the carrier's background token
    pub accessibility: bool,
    pub min_contrast_ratio: f64,
}

impl Default for InjectionOptions {
    fn default() -> Self {
        Self {
            platform: Platform::Office,
            base_font_pt: DEFAULT_BASE_POINTS,
            dpi: DEFAULT_DPI,
            snap_to_baseline: false,
            baseline_grid_emu: DEFAULT_BASELINE_GRID,
            accessibility: false,
            min_contrast_ratio: 4.5,
        }
    }
}

/// A problem with one mapping. Never aborts the rest of the carrier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionIssue {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub message: String,
}

impl InjectionIssue {
    fn new(token: &str, target: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            target: target.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InjectionResult {
    pub carrier: String,
    /// Mappings written to at least one node
    pub tokens_applied: usize,
    pub nodes_affected: usize,
    /// Parts that were changed
    pub parts: Vec<String>,
    pub errors: Vec<InjectionIssue>,
    pub warnings: Vec<InjectionIssue>,
}

impl InjectionResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: InjectionResult) {
        self.tokens_applied += other.tokens_applied;
        self.nodes_affected += other.nodes_affected;
        self.parts.extend(other.parts);
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Encode `value` for a target of `kind`.
pub fn convert(kind: TargetKind, value: &TokenValue, options: &InjectionOptions) -> std::result::Result<String, String> {
    let emu = || {
        value
            .to_emu(options.base_font_pt, options.dpi)
            .map_err(|e| format!("expected a length: {}", e))
    };
    match kind {
        TargetKind::Emu => {
            let mut emu = emu()?;
            if options.snap_to_baseline {
                emu = unit::align_to_baseline(emu, options.baseline_grid_emu);
            }
            Ok(emu.value().to_string())
        },
        TargetKind::HalfPoints => Ok(emu()?.to_half_points().to_string()),
        TargetKind::Points => Ok(format_number(emu()?.to_points())),
        TargetKind::Centipoints => Ok(emu()?.to_centipoints().to_string()),
        TargetKind::Font => match value {
            TokenValue::Text(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
            other => Err(format!("expected a font name, found {} '{}'", other.type_name(), other)),
        },
        TargetKind::Color | TargetKind::ArgbColor => {
            let c = value
                .as_color()
                .ok_or_else(|| format!("expected a color, found {} '{}'", value.type_name(), value))?;
            Ok(if kind == TargetKind::ArgbColor {
                format!("FF{}", c.to_hex())
            } else {
                c.to_hex()
            })
        },
        TargetKind::Text => Ok(value.to_string()),
    }
}

/// Applies resolved tokens through carriers from a shared registry.
#[derive(Debug, Clone)]
pub struct Injector {
    registry: Arc<CarrierRegistry>,
    options: InjectionOptions,
    applier: Applier,
}

impl Injector {
    pub fn new(registry: Arc<CarrierRegistry>, options: InjectionOptions) -> Self {
        Self {
            registry,
            options,
            applier: Applier::default(),
        }
    }

    pub fn options(&self) -> &InjectionOptions {
        &self.options
    }

    fn carrier(&self, id: &str) -> Result<&CarrierDefinition> {
        self.registry
            .get(id)
            .ok_or_else(|| CarrierError::UnknownCarrier(id.to_string()))
    }

    /// Inject into a single tree.
    pub fn inject(
        &self,
        doc: &mut XmlDocument,
        tokens: &IndexMap<String, TokenValue>,
        carrier_id: &str,
    ) -> Result<InjectionResult> {
        let def = self.carrier(carrier_id)?;
        Ok(self.inject_with(doc, tokens, def))
    }

    /// Inject into every part of `package` matching the carrier's part
    /// pattern. Parts where nothing was written are left untouched.
    pub fn inject_package(
        &self,
        package: &mut Package,
        tokens: &IndexMap<String, TokenValue>,
        carrier_id: &str,
    ) -> Result<InjectionResult> {
        let def = self.carrier(carrier_id)?;
        let mut result = InjectionResult {
            carrier: def.id.clone(),
            ..Default::default()
        };

        let names: Vec<String> = package
            .parts()
            .filter(|p| p.is_xml() && p.partname().matches(&def.part))
            .map(|p| p.path().to_string())
            .collect();
        if names.is_empty() {
            warn!(carrier = %def.id, pattern = %def.part, "no part matches carrier");
            result.warnings.push(InjectionIssue::new(
                "",
                None,
                format!("no part matches '{}'", def.part),
            ));
            return Ok(result);
        }

        for name in names {
            let Some(snapshot) = package.snapshot_part(&name) else {
                continue;
            };
            if let Err(e) = snapshot.xml() {
                result.errors.push(InjectionIssue::new("", None, e.to_string()));
                continue;
            }
            let mut part_result = package.mutate_part(&name, |doc| self.inject_with(doc, tokens, def))?;
            if part_result.nodes_affected == 0 {
                package.restore_part(snapshot);
            } else {
                part_result.parts.push(name);
            }
            result.merge(part_result);
        }

        info!(
            carrier = %def.id,
            applied = result.tokens_applied,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "carrier injected"
        );
        Ok(result)
    }

    /// Inject with an explicit definition.
    pub fn inject_with(
        &self,
        doc: &mut XmlDocument,
        tokens: &IndexMap<String, TokenValue>,
        def: &CarrierDefinition,
    ) -> InjectionResult {
        let ns = def.namespace_map();
        let mut result = InjectionResult {
            carrier: def.id.clone(),
            ..Default::default()
        };
        let background = def
            .background
            .as_deref()
            .and_then(|id| tokens.get(id))
            .and_then(TokenValue::as_color)
            .unwrap_or(RGBColor::WHITE);

        for mapping in &def.mappings {
            let targets = def.targets(mapping, self.options.platform);
            if targets.is_empty() {
                result.warnings.push(InjectionIssue::new(
                    &mapping.token,
                    None,
                    format!("no template for platform {}", self.options.platform),
                ));
                continue;
            }
            let Some(value) = tokens.get(&mapping.token) else {
                warn!(carrier = %def.id, token = %mapping.token, "token not resolved");
                result.warnings.push(InjectionIssue::new(&mapping.token, None, "token not resolved"));
                continue;
            };

            if self.options.accessibility && def.background.as_deref() != Some(mapping.token.as_str()) {
                self.check_contrast(mapping, &targets, value, background, &mut result);
            }

            let mut written = false;
            for target in &targets {
                let kind = TargetKind::classify(target);
                let encoded = match convert(kind, value, &self.options) {
                    Ok(v) => v,
                    Err(message) => {
                        result
                            .errors
                            .push(InjectionIssue::new(&mapping.token, Some(target), message));
                        continue;
                    },
                };
                let op = PatchOperation::set(target.as_str(), encoded);
                match self.applier.plan(doc, &op, &ns) {
                    Ok(plan) if plan.is_empty() => {
                        result.warnings.push(InjectionIssue::new(
                            &mapping.token,
                            Some(target),
                            "target matched no nodes",
                        ));
                    },
                    Ok(plan) => {
                        let affected = self.applier.execute(doc, plan);
                        debug!(token = %mapping.token, target = %target, affected, "token written");
                        result.nodes_affected += affected;
                        written = true;
                    },
                    Err(e) => {
                        result
                            .errors
                            .push(InjectionIssue::new(&mapping.token, Some(target), e.to_string()));
                    },
                }
            }
            if written {
                result.tokens_applied += 1;
            }
        }
        result
    }

    fn check_contrast(
        &self,
        mapping: &Mapping,
        targets: &[String],
        value: &TokenValue,
        background: RGBColor,
        result: &mut InjectionResult,
    ) {
        if !targets.iter().any(|t| TargetKind::classify(t).is_color()) {
            return;
        }
        let Some(fg) = value.as_color() else {
            // Reported as a conversion error when written.
            return;
        };
        let ratio = color::contrast_ratio(fg, background);
        if ratio < self.options.min_contrast_ratio {
            warn!(token = %mapping.token, ratio, "insufficient contrast");
            result.warnings.push(InjectionIssue::new(
                &mapping.token,
                None,
                format!(
                    "contrast {:.2}:1 of {} against {} is below {:.1}:1",
                    ratio, fg, background, self.options.min_contrast_ratio
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{ElementFamily, Mapping};
    use crate::opc::{DocumentKind, fixtures};

    const MASTER: &str = r#"<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="4400"><a:solidFill><a:srgbClr val="000000"/></a:solidFill><a:latin typeface="+mj-lt"/></a:defRPr></a:lvl1pPr></p:titleStyle></p:txStyles></p:sldMaster>"#;

    fn tokens(pairs: &[(&str, &str)]) -> IndexMap<String, TokenValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), TokenValue::from_literal(v)))
            .collect()
    }

    fn injector(options: InjectionOptions) -> Injector {
        Injector::new(Arc::new(CarrierRegistry::builtin()), options)
    }

    #[test]
    fn test_classify_targets() {
        assert_eq!(TargetKind::classify("/p:sp/a:xfrm/a:ext/@cx"), TargetKind::Emu);
        assert_eq!(TargetKind::classify("w:rPr/w:sz/@w:val"), TargetKind::HalfPoints);
        assert_eq!(TargetKind::classify("x:font/x:sz/@val"), TargetKind::Points);
        assert_eq!(TargetKind::classify("a:defRPr/@sz"), TargetKind::Centipoints);
        assert_eq!(TargetKind::classify("a:latin/@typeface"), TargetKind::Font);
        assert_eq!(TargetKind::classify("w:rFonts/@w:ascii"), TargetKind::Font);
        assert_eq!(TargetKind::classify("x:color/@rgb"), TargetKind::ArgbColor);
        assert_eq!(TargetKind::classify("a:solidFill/a:srgbClr/@val"), TargetKind::Color);
        assert_eq!(TargetKind::classify("/p:cSld/@name"), TargetKind::Text);
    }

    #[test]
    fn test_convert() {
        let opts = InjectionOptions::default();
        let size = TokenValue::from_literal("14pt");
        assert_eq!(convert(TargetKind::HalfPoints, &size, &opts).unwrap(), "28");
        assert_eq!(convert(TargetKind::Centipoints, &size, &opts).unwrap(), "1400");
        assert_eq!(convert(TargetKind::Points, &size, &opts).unwrap(), "14");
        assert_eq!(
            convert(TargetKind::Emu, &TokenValue::from_literal("1in"), &opts).unwrap(),
            "914400"
        );
        let red = TokenValue::from_literal("#FF0000");
        assert_eq!(convert(TargetKind::Color, &red, &opts).unwrap(), "FF0000");
        assert_eq!(convert(TargetKind::ArgbColor, &red, &opts).unwrap(), "FFFF0000");
        assert!(convert(TargetKind::Color, &size, &opts).is_err());
        assert!(convert(TargetKind::Font, &size, &opts).is_err());
        assert!(convert(TargetKind::Centipoints, &red, &opts).is_err());

        let snapping = InjectionOptions {
            snap_to_baseline: true,
            ..Default::default()
        };
        let raw = TokenValue::Dimension {
            value: 200.0,
            unit: unit::LengthUnit::Emu,
        };
        assert_eq!(convert(TargetKind::Emu, &raw, &snapping).unwrap(), "360");

        let enormous = TokenValue::Dimension {
            value: 1e300,
            unit: unit::LengthUnit::Point,
        };
        let snapped: i64 = convert(TargetKind::Emu, &enormous, &snapping).unwrap().parse().unwrap();
        assert_eq!(snapped % 360, 0);
        assert!(snapped > 0);
    }

    #[test]
    fn test_inject_tree_partial_failures() {
        let mut doc = XmlDocument::parse(MASTER.as_bytes()).unwrap();
        let result = injector(InjectionOptions::default())
            .inject(
                &mut doc,
                &tokens(&[
                    ("typography.title.size", "36pt"),
                    ("color.title", "not a color"),
                    ("font.heading", "Georgia"),
                ]),
                "pptx.title",
            )
            .unwrap();
        assert_eq!(result.tokens_applied, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].token, "color.title");
        let xml = doc.to_xml_string();
        assert!(xml.contains(r#"<a:defRPr sz="3600">"#));
        assert!(xml.contains(r#"typeface="Georgia""#));
        assert!(xml.contains(r#"val="000000""#));
    }

    #[test]
    fn test_contrast_warning() {
        let mut doc = XmlDocument::parse(MASTER.as_bytes()).unwrap();
        let options = InjectionOptions {
            accessibility: true,
            ..Default::default()
        };
        let result = injector(options)
            .inject(&mut doc, &tokens(&[("color.title", "#FFFF00")]), "pptx.title")
            .unwrap();
        assert_eq!(result.tokens_applied, 1);
        assert!(result.warnings.iter().any(|w| w.message.contains("contrast")));

        let mut doc = XmlDocument::parse(MASTER.as_bytes()).unwrap();
        let result = injector(InjectionOptions {
            accessibility: true,
            ..Default::default()
        })
        .inject(
            &mut doc,
            &tokens(&[("color.title", "#FFFF00"), ("color.background", "#000000")]),
            "pptx.title",
        )
        .unwrap();
        assert!(!result.warnings.iter().any(|w| w.message.contains("contrast")));
    }

    #[test]
    fn test_unknown_carrier() {
        let mut doc = XmlDocument::parse(MASTER.as_bytes()).unwrap();
        let err = injector(InjectionOptions::default())
            .inject(&mut doc, &IndexMap::new(), "nope")
            .unwrap_err();
        assert!(matches!(err, CarrierError::UnknownCarrier(_)));
    }

    #[test]
    fn test_inject_package_theme() {
        let source = fixtures::minimal_potx();
        let mut pkg = Package::from_bytes(source.clone()).unwrap();
        let result = injector(InjectionOptions::default())
            .inject_package(
                &mut pkg,
                &tokens(&[
                    ("color.accent1", "#C00000"),
                    ("color.dark1", "#111111"),
                    ("font.heading", "Georgia"),
                ]),
                "pptx.theme.colors",
            )
            .unwrap();
        assert_eq!(result.tokens_applied, 1);
        assert_eq!(result.parts, ["ppt/theme/theme1.xml"]);
        // dk1 uses a system color, so the srgbClr target matches nothing.
        assert!(result.warnings.iter().any(|w| w.token == "color.dark1"));
        assert!(result.success());

        let theme = pkg.part("ppt/theme/theme1.xml").unwrap().xml().unwrap().to_xml_string();
        assert!(theme.contains(r#"<a:srgbClr val="C00000"/>"#));
        assert!(theme.contains(r#"<a:srgbClr val="ED7D31"/>"#));
        assert!(!pkg.part("ppt/slides/slide1.xml").unwrap().is_dirty());
    }

    #[test]
    fn test_inject_package_leaves_unmatched_parts_clean() {
        let mut pkg = Package::from_bytes(fixtures::minimal_potx()).unwrap();
        let injector = injector(InjectionOptions::default());

        let result = injector
            .inject_package(&mut pkg, &tokens(&[("color.dark1", "#111111")]), "pptx.theme.colors")
            .unwrap();
        assert_eq!(result.tokens_applied, 0);
        assert!(!pkg.is_dirty());

        let result = injector
            .inject_package(&mut pkg, &tokens(&[("typography.title.size", "40pt")]), "pptx.title")
            .unwrap();
        assert!(result.warnings[0].message.contains("no part matches"));
    }

    #[test]
    fn test_inject_docx_defaults() {
        let mut pkg = Package::from_bytes(fixtures::minimal_docx()).unwrap();
        let result = injector(InjectionOptions::default())
            .inject_package(
                &mut pkg,
                &tokens(&[("typography.body.size", "14pt"), ("font.body", "Arial")]),
                "docx.defaults",
            )
            .unwrap();
        // sz, rFonts ascii, rFonts hAnsi; szCs is absent in the fixture.
        assert_eq!(result.tokens_applied, 3);
        assert_eq!(result.nodes_affected, 3);
        let styles = pkg.part("word/styles.xml").unwrap().xml().unwrap().to_xml_string();
        assert!(styles.contains(r#"<w:sz w:val="28"/>"#));
        assert!(styles.contains(r#"w:ascii="Arial""#));
        assert!(styles.contains(r#"w:hAnsi="Arial""#));
    }

    #[test]
    fn test_custom_geometry_carrier() {
        let mut registry = CarrierRegistry::new();
        registry
            .register(CarrierDefinition {
                id: "logo".into(),
                family: ElementFamily::Body,
                document: DocumentKind::Presentation,
                part: "ppt/slides/*.xml".into(),
                description: None,
                namespaces: IndexMap::new(),
                templates: IndexMap::from([(Platform::Office, vec!["//a:ext".to_string()])]),
                mappings: vec![Mapping::new("logo.width", "@cx")],
                background: None,
            })
            .unwrap();
        let injector = Injector::new(
            Arc::new(registry),
            InjectionOptions {
                snap_to_baseline: true,
                ..Default::default()
            },
        );
        let mut doc = XmlDocument::parse(
            br#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><a:ext cx="1" cy="1"/></p:sld>"#,
        )
        .unwrap();
        let result = injector.inject(&mut doc, &tokens(&[("logo.width", "1in")]), "logo").unwrap();
        assert_eq!(result.tokens_applied, 1);
        assert!(doc.to_xml_string().contains(r#"cx="914400""#));
    }
}
