use crate::xml::XPathError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable classification of apply failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyErrorKind {
    /// Target is not a usable XPath node-set expression
    InvalidTarget,
    /// Target matched nothing and matches were required
    NoMatch,
    /// A fragment is not well-formed XML
    FragmentParse,
    /// The value has the wrong shape for the operation
    InvalidValue,
    /// The mutation would break the tree (e.g. a sibling of the root)
    StructuralConflict,
    DuplicateRelationshipId,
    UnboundPrefix,
}

impl ApplyErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyErrorKind::InvalidTarget => "invalid_target",
            ApplyErrorKind::NoMatch => "no_match",
            ApplyErrorKind::FragmentParse => "fragment_parse",
            ApplyErrorKind::InvalidValue => "invalid_value",
            ApplyErrorKind::StructuralConflict => "structural_conflict",
            ApplyErrorKind::DuplicateRelationshipId => "duplicate_relationship_id",
            ApplyErrorKind::UnboundPrefix => "unbound_prefix",
        }
    }
}

impl fmt::Display for ApplyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{kind}: {message}")]
pub struct ApplyError {
    pub kind: ApplyErrorKind,
    pub message: String,
}

impl ApplyError {
    pub fn new(kind: ApplyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_xpath(target: &str, err: XPathError) -> Self {
        match err {
            XPathError::UnboundPrefix(prefix) => ApplyError::new(
                ApplyErrorKind::UnboundPrefix,
                format!("prefix '{}' in target '{}' is not bound", prefix, target),
            ),
            other => ApplyError::new(
                ApplyErrorKind::InvalidTarget,
                format!("target '{}': {}", target, other),
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApplyError>;
