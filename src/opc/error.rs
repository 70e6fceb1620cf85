/// Error types for OPC package operations
use crate::xml::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Required part missing: {0}")]
    MissingPart(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Invalid part name: {0}")]
    InvalidPartName(String),

    #[error("XML error in part {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    pub(crate) fn xml(part: &str, source: XmlError) -> Self {
        PackageError::Xml {
            part: part.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
