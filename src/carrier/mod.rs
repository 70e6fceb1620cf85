//! Carriers map design tokens onto document XML.
//!
//! A [`CarrierDefinition`] names the part a class of element lives in, one or
//! more base XPath templates per [`Platform`], and the token-to-target
//! mappings under those bases. The [`Injector`] converts each resolved token
//! to the encoding its target expects (EMU, half-points, centipoints, hex
//! colors, font names) and writes it with the patch applier.
//!
//! ```
//! use std::sync::Arc;
//! use indexmap::IndexMap;
//! use kumquat::carrier::{CarrierRegistry, InjectionOptions, Injector};
//! use kumquat::tokens::TokenValue;
//! use kumquat::xml::XmlDocument;
//!
//! let xml = br#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:themeElements><a:fontScheme><a:majorFont><a:latin typeface="Calibri Light"/></a:majorFont></a:fontScheme></a:themeElements></a:theme>"#;
//! let mut doc = XmlDocument::parse(xml).unwrap();
//!
//! let mut tokens = IndexMap::new();
//! tokens.insert("font.heading".to_string(), TokenValue::from_literal("Georgia"));
//!
//! let injector = Injector::new(Arc::new(CarrierRegistry::builtin()), InjectionOptions::default());
//! let result = injector.inject(&mut doc, &tokens, "pptx.theme.fonts").unwrap();
//! assert_eq!(result.tokens_applied, 1);
//! ```

mod builtin;
pub mod definition;
pub mod error;
pub mod inject;
pub mod registry;

pub use definition::{CarrierDefinition, ElementFamily, Mapping, Platform};
pub use error::CarrierError;
pub use inject::{InjectionIssue, InjectionOptions, InjectionResult, Injector, TargetKind, convert};
pub use registry::CarrierRegistry;
