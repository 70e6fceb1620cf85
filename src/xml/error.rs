/// Error types for the XML tree layer.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("invalid UTF-8 in XML: {0}")]
    Utf8(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("unclosed element <{0}>")]
    Unclosed(String),

    #[error("unknown entity reference &{0};")]
    UnknownEntity(String),

    #[error("text content outside the root element")]
    TextOutsideRoot,

    #[error("namespace prefix '{0}' is not bound")]
    UnboundPrefix(String),
}

pub type Result<T> = std::result::Result<T, XmlError>;
