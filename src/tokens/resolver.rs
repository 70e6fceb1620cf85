use super::error::{ResolutionError, Result};
use super::formula::{self, Evaluator};
use super::layer::{LayerKind, ResolutionContext, TokenLayer, TokenLayers};
use super::value::TokenValue;
use crate::common::value::Scalar;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A token resolved under one context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedToken {
    pub id: String,
    pub value: TokenValue,
    /// Layer kind that defined the token
    pub layer: LayerKind,
    pub layer_name: String,
    /// Higher is more specific; unique per layer
    pub precedence: u32,
    /// The definition before evaluation
    pub raw: String,
    /// Undefined references left in place, here or in anything referenced
    pub warnings: Vec<ResolutionError>,
}

/// Outcome of resolving every defined token.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedTokens {
    pub tokens: IndexMap<String, ResolvedToken>,
    pub errors: Vec<ResolutionError>,
}

impl ResolvedTokens {
    pub fn get(&self, id: &str) -> Option<&TokenValue> {
        self.tokens.get(id).map(|t| &t.value)
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Token values keyed by id, as the injector consumes them.
    pub fn values(&self) -> IndexMap<String, TokenValue> {
        self.tokens
            .iter()
            .map(|(id, t)| (id.clone(), t.value.clone()))
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ResolutionError> {
        self.tokens.values().flat_map(|t| t.warnings.iter())
    }
}

/// Resolves token ids through a [`TokenLayers`] chain.
///
/// Holds no cache between calls, so one resolver may serve concurrent
/// callers with different contexts.
#[derive(Debug, Clone, Copy)]
pub struct TokenResolver<'a> {
    layers: &'a TokenLayers,
}

impl<'a> TokenResolver<'a> {
    pub fn new(layers: &'a TokenLayers) -> Self {
        Self { layers }
    }

    pub fn resolve(&self, id: &str, ctx: &ResolutionContext) -> Result<ResolvedToken> {
        let mut pass = Pass::new(self.layers, ctx);
        pass.resolve(id)
    }

    pub fn resolve_all(&self, ctx: &ResolutionContext) -> ResolvedTokens {
        let mut pass = Pass::new(self.layers, ctx);
        let mut out = ResolvedTokens::default();
        for id in self.layers.ids(ctx) {
            match pass.resolve(&id) {
                Ok(token) => {
                    out.tokens.insert(id, token);
                },
                Err(err) => out.errors.push(err),
            }
        }
        debug!(
            resolved = out.tokens.len(),
            errors = out.errors.len(),
            "resolved token layers"
        );
        out
    }
}

/// One resolution pass; the memo lives only as long as the pass.
struct Pass<'a> {
    ctx: &'a ResolutionContext,
    chain: Vec<(u32, &'a TokenLayer)>,
    memo: HashMap<String, ResolvedToken>,
    stack: Vec<String>,
}

impl<'a> Pass<'a> {
    fn new(layers: &'a TokenLayers, ctx: &'a ResolutionContext) -> Self {
        Self {
            ctx,
            chain: layers.chain(ctx),
            memo: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn lookup(&self, id: &str) -> Option<(u32, &'a TokenLayer, &'a Scalar)> {
        self.chain
            .iter()
            .find_map(|&(precedence, layer)| layer.get(id).map(|v| (precedence, layer, v)))
    }

    fn resolve(&mut self, id: &str) -> Result<ResolvedToken> {
        if let Some(done) = self.memo.get(id) {
            return Ok(done.clone());
        }
        if let Some(pos) = self.stack.iter().position(|s| s == id) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(id.to_string());
            return Err(ResolutionError::Circular { chain });
        }
        let (precedence, layer, raw) = self.lookup(id).ok_or_else(|| ResolutionError::Undefined { id: id.to_string() })?;

        self.stack.push(id.to_string());
        let evaluated = self.evaluate(id, raw);
        self.stack.pop();
        let (value, warnings) = evaluated?;

        let token = ResolvedToken {
            id: id.to_string(),
            value,
            layer: layer.kind(),
            layer_name: layer.name().to_string(),
            precedence,
            raw: raw.to_text(),
            warnings,
        };
        debug!(token = id, layer = %token.layer, value = %token.value, "resolved token");
        self.memo.insert(id.to_string(), token.clone());
        Ok(token)
    }

    fn evaluate(&mut self, id: &str, raw: &Scalar) -> Result<(TokenValue, Vec<ResolutionError>)> {
        let Scalar::String(text) = raw else {
            return Ok((TokenValue::from_scalar(raw), Vec::new()));
        };
        if !formula::has_references(text) {
            return Ok((TokenValue::from_literal(text), Vec::new()));
        }

        let mut values = HashMap::new();
        let mut warnings = Vec::new();
        let mut missing = false;
        for reference in formula::references(text) {
            match self.resolve(&reference) {
                Ok(token) => {
                    warnings.extend(token.warnings.iter().cloned());
                    values.insert(reference, token.value);
                },
                Err(ResolutionError::Undefined { id: undefined }) if undefined == reference => {
                    warn!(token = id, reference = %reference, "undefined token reference left in place");
                    warnings.push(ResolutionError::Undefined { id: undefined });
                    missing = true;
                },
                Err(err) => return Err(err),
            }
        }

        let interpolated = |values: &HashMap<String, TokenValue>| {
            TokenValue::Text(formula::interpolate(text, |r| values.get(r).map(ToString::to_string)))
        };
        if missing {
            return Ok((interpolated(&values), warnings));
        }

        match formula::parse(text) {
            Ok(expr) => {
                let evaluator = Evaluator {
                    values: &values,
                    base_points: self.ctx.base_font_pt,
                    dpi: self.ctx.dpi,
                };
                let value = evaluator
                    .evaluate(&expr)
                    .map_err(|message| ResolutionError::formula(id, message))?;
                Ok((value, warnings))
            },
            // Not arithmetic: treat as a template string.
            Err(_) => {
                let value = match interpolated(&values) {
                    TokenValue::Text(t) => TokenValue::from_literal(&t),
                    other => other,
                };
                Ok((value, warnings))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::color::RGBColor;
    use crate::common::unit::LengthUnit;

    fn scenario() -> TokenLayers {
        TokenLayers::new()
            .with_layer(TokenLayer::new(LayerKind::Foundation, "base").with_token("spacing.base", "16px"))
            .with_layer(
                TokenLayer::new(LayerKind::Channel, "presentation")
                    .with_token("spacing.large", "{spacing.base} * 2"),
            )
    }

    #[test]
    fn test_formula_over_lower_layer() {
        let layers = scenario();
        let token = TokenResolver::new(&layers)
            .resolve("spacing.large", &ResolutionContext::default())
            .unwrap();
        assert_eq!(token.value.to_string(), "32px");
        assert_eq!(token.layer, LayerKind::Channel);
        assert_eq!(token.raw, "{spacing.base} * 2");
        assert!(token.warnings.is_empty());
    }

    #[test]
    fn test_most_specific_layer_wins() {
        let layers = TokenLayers::new()
            .with_layer(TokenLayer::new(LayerKind::Foundation, "base").with_token("color.primary", "#000000"))
            .with_layer(TokenLayer::new(LayerKind::Template, "deck").with_token("color.primary", "#FF0000"))
            .with_layer(TokenLayer::new(LayerKind::Corporate, "brand").with_token("color.primary", "#4472C4"));
        let resolver = TokenResolver::new(&layers);
        let token = resolver.resolve("color.primary", &ResolutionContext::default()).unwrap();
        assert_eq!(token.value, TokenValue::Color(RGBColor::new(255, 0, 0)));
        assert_eq!(token.layer_name, "deck");

        // Foundation-level references still see the winning value.
        let layers = layers.with_layer(
            TokenLayer::new(LayerKind::Foundation, "derived").with_token("color.hover", "{color.primary}.darken(100%)"),
        );
        let token = TokenResolver::new(&layers)
            .resolve("color.hover", &ResolutionContext::default())
            .unwrap();
        assert_eq!(token.value, TokenValue::Color(RGBColor::BLACK));
    }

    #[test]
    fn test_circular_reference() {
        let layers = TokenLayers::new().with_layer(
            TokenLayer::new(LayerKind::Foundation, "base")
                .with_token("a", "{b} + 1")
                .with_token("b", "{c} * 2")
                .with_token("c", "{a}"),
        );
        let err = TokenResolver::new(&layers)
            .resolve("a", &ResolutionContext::default())
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Circular {
                chain: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_undefined_reference_left_in_place() {
        let layers = TokenLayers::new().with_layer(
            TokenLayer::new(LayerKind::Foundation, "base")
                .with_token("font.body", "{font.family}, sans-serif")
                .with_token("font.heading", "{font.body}"),
        );
        let resolver = TokenResolver::new(&layers);
        let ctx = ResolutionContext::default();
        let token = resolver.resolve("font.body", &ctx).unwrap();
        assert_eq!(token.value, TokenValue::Text("{font.family}, sans-serif".into()));
        assert_eq!(
            token.warnings,
            [ResolutionError::Undefined {
                id: "font.family".into()
            }]
        );

        // Warnings propagate to dependents.
        let heading = resolver.resolve("font.heading", &ctx).unwrap();
        assert_eq!(heading.warnings.len(), 1);

        assert!(matches!(
            resolver.resolve("font.missing", &ctx),
            Err(ResolutionError::Undefined { .. })
        ));
    }

    #[test]
    fn test_interpolated_text() {
        let layers = TokenLayers::new().with_layer(
            TokenLayer::new(LayerKind::Foundation, "base")
                .with_token("font.family", "Calibri")
                .with_token("font.heading", "{font.family} Light"),
        );
        let token = TokenResolver::new(&layers)
            .resolve("font.heading", &ResolutionContext::default())
            .unwrap();
        assert_eq!(token.value, TokenValue::Text("Calibri Light".into()));
    }

    #[test]
    fn test_em_uses_context_base() {
        let layers = TokenLayers::new().with_layer(
            TokenLayer::new(LayerKind::Foundation, "base")
                .with_token("size.body", "12pt")
                .with_token("size.title", "{size.body} + 1em"),
        );
        let ctx = ResolutionContext {
            base_font_pt: 24.0,
            ..Default::default()
        };
        let token = TokenResolver::new(&layers).resolve("size.title", &ctx).unwrap();
        assert_eq!(
            token.value,
            TokenValue::Dimension {
                value: 36.0,
                unit: LengthUnit::Point
            }
        );
    }

    #[test]
    fn test_resolve_all_accumulates() {
        let layers = TokenLayers::new().with_layer(
            TokenLayer::new(LayerKind::Foundation, "base")
                .with_token("ok", "4px")
                .with_token("bad", "{ok} * 2px")
                .with_token("loop", "{loop}"),
        );
        let all = TokenResolver::new(&layers).resolve_all(&ResolutionContext::default());
        assert_eq!(all.tokens.len(), 1);
        assert_eq!(all.errors.len(), 2);
        assert!(!all.is_complete());
        assert_eq!(all.get("ok").map(ToString::to_string).as_deref(), Some("4px"));
    }

    #[test]
    fn test_selected_channel() {
        let layers = scenario().with_layer(
            TokenLayer::new(LayerKind::Channel, "document").with_token("spacing.large", "{spacing.base} * 3"),
        );
        let resolver = TokenResolver::new(&layers);
        let doc = resolver
            .resolve("spacing.large", &ResolutionContext::default().with_channel("document"))
            .unwrap();
        assert_eq!(doc.value.to_string(), "48px");
        // Ambiguous channel without a selection is not consulted.
        assert!(
            resolver
                .resolve("spacing.large", &ResolutionContext::default())
                .is_err()
        );
    }
}
