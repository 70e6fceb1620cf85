//! Design tokens.
//!
//! Tokens are defined in layers that form a precedence chain, from global
//! foundation defaults through the corporate brand and a use-case channel to
//! a template override. Resolving an id walks the chain from the most
//! specific layer and takes the first definition found. Definitions may be
//! formulas over other tokens (see [`formula`]).
//!
//! # Example
//!
//! ```
//! use kumquat::tokens::{LayerKind, ResolutionContext, TokenLayer, TokenLayers, TokenResolver};
//!
//! let layers = TokenLayers::new()
//!     .with_layer(TokenLayer::new(LayerKind::Foundation, "base").with_token("spacing.base", "16px"))
//!     .with_layer(
//!         TokenLayer::new(LayerKind::Channel, "presentation")
//!             .with_token("spacing.large", "{spacing.base} * 2"),
//!     );
//!
//! let token = TokenResolver::new(&layers)
//!     .resolve("spacing.large", &ResolutionContext::default())
//!     .unwrap();
//! assert_eq!(token.value.to_string(), "32px");
//! ```

pub mod error;
pub mod formula;
pub mod layer;
pub mod resolver;
pub mod value;

pub use error::ResolutionError;
pub use layer::{LayerKind, ResolutionContext, TokenLayer, TokenLayers};
pub use resolver::{ResolvedToken, ResolvedTokens, TokenResolver};
pub use value::TokenValue;
