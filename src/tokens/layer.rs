//! Token layers and the precedence chain they form.

use super::error::{ResolutionError, Result};
use crate::common::unit::{DEFAULT_BASE_POINTS, DEFAULT_DPI};
use crate::common::value::{PatchValue, Scalar};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a layer in the precedence chain, least specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Global defaults
    Foundation,
    /// Organization brand
    Corporate,
    /// Use case, e.g. "presentation" or "document"
    Channel,
    /// Innermost override
    Template,
}

impl LayerKind {
    /// Most specific first.
    pub const SEARCH_ORDER: [LayerKind; 4] = [
        LayerKind::Template,
        LayerKind::Channel,
        LayerKind::Corporate,
        LayerKind::Foundation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Foundation => "foundation",
            LayerKind::Corporate => "corporate",
            LayerKind::Channel => "channel",
            LayerKind::Template => "template",
        }
    }

    fn rank(self) -> u32 {
        match self {
            LayerKind::Foundation => 0,
            LayerKind::Corporate => 1,
            LayerKind::Channel => 2,
            LayerKind::Template => 3,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "foundation" => Ok(LayerKind::Foundation),
            "corporate" => Ok(LayerKind::Corporate),
            "channel" => Ok(LayerKind::Channel),
            "template" => Ok(LayerKind::Template),
            other => Err(format!("unknown token layer '{}'", other)),
        }
    }
}

/// One named set of token definitions, keyed by dotted id.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLayer {
    kind: LayerKind,
    name: String,
    tokens: IndexMap<String, Scalar>,
}

impl TokenLayer {
    pub fn new(kind: LayerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            tokens: IndexMap::new(),
        }
    }

    pub fn with_token(mut self, id: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<Scalar>) {
        self.tokens.insert(id.into(), value.into());
    }

    /// Build a layer from a nested mapping.
    ///
    /// Nested maps flatten to dotted ids. A map carrying `$value` or `value`
    /// is a leaf; sibling keys starting with `$` (`$type`, `$description`)
    /// are metadata and ignored.
    pub fn from_value(kind: LayerKind, name: impl Into<String>, value: &PatchValue) -> Result<Self> {
        let mut layer = TokenLayer::new(kind, name);
        let Some(root) = value.as_mapping() else {
            return Err(layer.error(format!("expected a mapping, found {}", value.type_name())));
        };
        let mut tokens = IndexMap::new();
        flatten(&layer, "", root, &mut tokens)?;
        layer.tokens = tokens;
        Ok(layer)
    }

    /// Parse a YAML or JSON token document.
    pub fn from_yaml(kind: LayerKind, name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let value: PatchValue = serde_saphyr::from_str(text).map_err(|e| ResolutionError::Layer {
            layer: name.clone(),
            message: e.to_string(),
        })?;
        Self::from_value(kind, name, &value)
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, id: &str) -> Option<&Scalar> {
        self.tokens.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn error(&self, message: String) -> ResolutionError {
        ResolutionError::Layer {
            layer: self.name.clone(),
            message,
        }
    }
}

fn flatten(
    layer: &TokenLayer,
    prefix: &str,
    map: &IndexMap<String, PatchValue>,
    out: &mut IndexMap<String, Scalar>,
) -> Result<()> {
    for (key, value) in map {
        if key.starts_with('$') {
            continue;
        }
        let id = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            PatchValue::Scalar(Scalar::Null) => {},
            PatchValue::Scalar(scalar) => {
                out.insert(id, scalar.clone());
            },
            PatchValue::Mapping(children) => {
                let leaf = children.get("$value").or_else(|| children.get("value"));
                match leaf {
                    Some(PatchValue::Scalar(scalar)) => {
                        out.insert(id, scalar.clone());
                    },
                    Some(other) => {
                        return Err(layer.error(format!(
                            "token '{}' has a {} value",
                            id,
                            other.type_name()
                        )));
                    },
                    None => flatten(layer, &id, children, out)?,
                }
            },
            PatchValue::Sequence(_) => {
                return Err(layer.error(format!("token '{}' is a sequence", id)));
            },
        }
    }
    Ok(())
}

/// Per-call resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionContext {
    /// Name of the channel layer to consult
    pub channel: Option<String>,
    /// Name of the template layer to consult
    pub template: Option<String>,
    /// Font size `em` and `%` are relative to
    pub base_font_pt: f64,
    pub dpi: u32,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self {
            channel: None,
            template: None,
            base_font_pt: DEFAULT_BASE_POINTS,
            dpi: DEFAULT_DPI,
        }
    }
}

impl ResolutionContext {
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// All registered layers.
///
/// Several channel and template layers may be registered. The context picks
/// one of each by name; without a name, a kind is consulted only when exactly
/// one layer of that kind exists. Foundation and corporate layers always
/// apply, and when several share a kind the one added last wins.
#[derive(Debug, Clone, Default)]
pub struct TokenLayers {
    layers: Vec<TokenLayer>,
}

impl TokenLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: TokenLayer) {
        self.layers.push(layer);
    }

    pub fn with_layer(mut self, layer: TokenLayer) -> Self {
        self.push(layer);
        self
    }

    pub fn layers(&self) -> &[TokenLayer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers consulted under `ctx`, most specific first, paired with their
    /// precedence key.
    pub fn chain(&self, ctx: &ResolutionContext) -> Vec<(u32, &TokenLayer)> {
        let mut chain = Vec::new();
        for kind in LayerKind::SEARCH_ORDER {
            let selector = match kind {
                LayerKind::Channel => ctx.channel.as_deref(),
                LayerKind::Template => ctx.template.as_deref(),
                _ => None,
            };
            let of_kind: Vec<(usize, &TokenLayer)> = self
                .layers
                .iter()
                .enumerate()
                .filter(|(_, l)| l.kind == kind)
                .collect();
            let selected: Vec<(usize, &TokenLayer)> = match (kind, selector) {
                (LayerKind::Channel | LayerKind::Template, Some(name)) => of_kind
                    .into_iter()
                    .filter(|(_, l)| l.name == name)
                    .collect(),
                (LayerKind::Channel | LayerKind::Template, None) if of_kind.len() > 1 => Vec::new(),
                _ => of_kind,
            };
            for (index, layer) in selected.into_iter().rev() {
                chain.push(((kind.rank() << 16) | index as u32, layer));
            }
        }
        chain
    }

    /// Ids defined by any layer under `ctx`, in first-definition order.
    pub fn ids(&self, ctx: &ResolutionContext) -> Vec<String> {
        let mut chain = self.chain(ctx);
        chain.reverse();
        let mut ids: IndexMap<&str, ()> = IndexMap::new();
        for (_, layer) in chain {
            for id in layer.ids() {
                ids.insert(id, ());
            }
        }
        ids.into_keys().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested_yaml() {
        let yaml = "color:\n  primary: \"#4472C4\"\n  accent:\n    $value: \"#ED7D31\"\n    $type: color\nspacing:\n  base: 16px\n  unused: null\n";
        let layer = TokenLayer::from_yaml(LayerKind::Foundation, "base", yaml).unwrap();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.get("color.primary").and_then(Scalar::as_str), Some("#4472C4"));
        assert_eq!(layer.get("color.accent").and_then(Scalar::as_str), Some("#ED7D31"));
        assert_eq!(layer.get("spacing.base").and_then(Scalar::as_str), Some("16px"));
        assert!(!layer.contains("color.accent.$type"));
    }

    #[test]
    fn test_layer_rejects_sequences() {
        let err = TokenLayer::from_yaml(LayerKind::Corporate, "brand", "palette: [a, b]\n").unwrap_err();
        assert!(matches!(err, ResolutionError::Layer { .. }));
        let err = TokenLayer::from_yaml(LayerKind::Corporate, "brand", "- a\n").unwrap_err();
        assert!(matches!(err, ResolutionError::Layer { .. }));
    }

    #[test]
    fn test_chain_order_and_selection() {
        let layers = TokenLayers::new()
            .with_layer(TokenLayer::new(LayerKind::Template, "deck"))
            .with_layer(TokenLayer::new(LayerKind::Foundation, "base"))
            .with_layer(TokenLayer::new(LayerKind::Channel, "presentation"))
            .with_layer(TokenLayer::new(LayerKind::Channel, "document"))
            .with_layer(TokenLayer::new(LayerKind::Corporate, "brand"));

        let names = |ctx: &ResolutionContext| -> Vec<String> {
            layers
                .chain(ctx)
                .into_iter()
                .map(|(_, l)| l.name().to_string())
                .collect()
        };

        // Two channels and no selection: neither applies.
        assert_eq!(names(&ResolutionContext::default()), ["deck", "brand", "base"]);
        assert_eq!(
            names(&ResolutionContext::default().with_channel("document")),
            ["deck", "document", "brand", "base"]
        );

        let chain = layers.chain(&ResolutionContext::default().with_channel("presentation"));
        let keys: Vec<u32> = chain.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_layer_kind_parse() {
        assert_eq!("Template".parse::<LayerKind>(), Ok(LayerKind::Template));
        assert!("brand".parse::<LayerKind>().is_err());
        assert!(LayerKind::Foundation < LayerKind::Template);
    }
}
