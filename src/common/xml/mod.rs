//! XML text helpers shared by the tree serializer and the normalizer.

mod escape;

pub use escape::{escape_attr, escape_text, unescape_xml};
