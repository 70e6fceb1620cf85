//! Kumquat - atomic patching and design-token injection for Office Open XML
//!
//! This library edits OOXML packages (.potx, .dotx, .xltx and their
//! non-template siblings) declaratively and safely.
//!
//! # Features
//!
//! - **Patch language**: YAML/JSON documents of `set`, `insert`, `extend`,
//!   `merge` and `relsAdd` operations with configurable validation strictness
//! - **XPath applier**: namespace-aware targeting over a mutable XML tree,
//!   planned in full before anything is changed
//! - **Transactions**: all-or-nothing application across one or more
//!   packages, with byte-exact rollback and an audit trail
//! - **Design tokens**: layered token resolution with formulas, unit and
//!   color math
//! - **Carriers**: mappings from token ids to XPath targets, with unit and
//!   color encoding per target
//! - **Semantic comparison**: namespace-prefix-insensitive XML normalization
//!   and diffing
//!
//! # Example - Applying a patch set
//!
//! ```no_run
//! use kumquat::{Engine, Config, Variables};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Config::default());
//! let parsed = engine.parse_patch_set(r#"
//! patches:
//!   - operation: set
//!     target: "//a:latin/@typeface"
//!     value: Georgia
//! "#);
//! let patch_set = parsed.into_result()?;
//!
//! let result = engine.apply_patch_set("brand.potx", &patch_set, &Variables::new())?;
//! println!("{} ({} operations)", result.state, result.audit.operations_completed.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Resolving and injecting tokens
//!
//! ```no_run
//! use kumquat::tokens::{LayerKind, ResolutionContext, TokenLayer, TokenLayers, TokenResolver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layers = TokenLayers::new()
//!     .with_layer(TokenLayer::new(LayerKind::Foundation, "base").with_token("color.accent1", "#C00000"));
//! let resolved = TokenResolver::new(&layers).resolve_all(&ResolutionContext::default());
//!
//! let result = kumquat::inject_tokens("brand.potx", &resolved.values(), "pptx.theme.colors")?;
//! println!("{} tokens applied", result.tokens_applied);
//! # Ok(())
//! # }
//! ```

/// Shared primitives: units, colors, values and the unified error type
pub mod common;

/// Mutable XML tree, namespaces, XPath, normalization and comparison
pub mod xml;

/// Open Packaging Conventions package model
pub mod opc;

/// Patch document model and parser
pub mod patch;

/// XPath-scoped mutation of XML trees
pub mod apply;

/// Atomic application of patch sets with rollback and audit
pub mod transaction;

/// Layered design-token resolution
pub mod tokens;

/// Carrier definitions and token injection
pub mod carrier;

pub mod config;

mod api;

pub use api::{
    Engine, Variables, apply_patch_set, inject_tokens, parse_patch_set, resolve_tokens, template_paths,
};
pub use common::{Error, FatalError, Result};
pub use config::{Config, ConfigError};
pub use opc::Package;
pub use patch::{ParseResult, PatchSet, ValidationLevel};
pub use transaction::{TransactionResult, TransactionState};
