//! Unified error type for kumquat.
//!
//! Each subsystem has its own error enum; [`Error`] wraps them all so callers
//! that do not care which stage failed can use one type.
use crate::apply::ApplyError;
use crate::carrier::CarrierError;
use crate::config::ConfigError;
use crate::opc::PackageError;
use crate::patch::ParseDiagnostics;
use crate::tokens::ResolutionError;
use crate::transaction::TransactionError;
use crate::xml::{XPathError, XmlError};
use serde::Serialize;
use thiserror::Error;

/// Conditions that callers must not retry automatically.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalError {
    #[error("storage is full")]
    StorageFull,

    #[error("out of memory")]
    OutOfMemory,
}

impl FatalError {
    /// Classify an I/O error; `None` for recoverable kinds.
    pub fn from_io(err: &std::io::Error) -> Option<Self> {
        match err.kind() {
            std::io::ErrorKind::StorageFull => Some(FatalError::StorageFull),
            std::io::ErrorKind::OutOfMemory => Some(FatalError::OutOfMemory),
            _ => None,
        }
    }
}

/// Main error type for kumquat operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(std::io::Error),

    /// Unrecoverable resource exhaustion
    #[error("Fatal: {0}")]
    Fatal(FatalError),

    /// Corrupt archive, missing part
    #[error(transparent)]
    Package(PackageError),

    /// Malformed XML
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// Invalid XPath expression
    #[error(transparent)]
    XPath(#[from] XPathError),

    /// Patch document rejected by the parser
    #[error("Patch rejected: {0}")]
    Parse(ParseDiagnostics),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Transaction(TransactionError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Carrier(CarrierError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether this error must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }

    pub fn fatal(&self) -> Option<FatalError> {
        match self {
            Error::Fatal(f) => Some(*f),
            _ => None,
        }
    }

    /// Stable category name for reports.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Fatal(_) => "fatal",
            Error::Package(_) => "package",
            Error::Xml(_) => "xml",
            Error::XPath(_) => "syntax",
            Error::Parse(_) => "validation",
            Error::Apply(_) => "apply",
            Error::Transaction(_) => "transaction",
            Error::Resolution(_) => "resolution",
            Error::Carrier(_) => "carrier",
            Error::Config(_) => "config",
        }
    }
}

/// Result type for kumquat operations.
pub type Result<T> = std::result::Result<T, Error>;
