use crate::opc::PackageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarrierError {
    #[error("Invalid carrier definitions: {0}")]
    Load(String),

    #[error("Invalid carrier '{id}': {message}")]
    Invalid { id: String, message: String },

    #[error("Carrier '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown carrier: {0}")]
    UnknownCarrier(String),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),
}

pub type Result<T> = std::result::Result<T, CarrierError>;
