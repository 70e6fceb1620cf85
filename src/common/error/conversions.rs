//! Error conversion implementations.
//!
//! I/O failures anywhere in the stack are checked for resource exhaustion
//! first, so a full disk surfaces as [`Error::Fatal`] no matter which layer
//! hit it.

use super::types::{Error, FatalError};
use crate::carrier::CarrierError;
use crate::opc::PackageError;
use crate::patch::ParseDiagnostics;
use crate::transaction::TransactionError;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match FatalError::from_io(&err) {
            Some(fatal) => Error::Fatal(fatal),
            None => Error::Io(err),
        }
    }
}

impl From<FatalError> for Error {
    fn from(err: FatalError) -> Self {
        Error::Fatal(err)
    }
}

impl From<PackageError> for Error {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Io(e) => Error::from(e),
            other => Error::Package(other),
        }
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Package(e) => Error::from(e),
            other => Error::Transaction(other),
        }
    }
}

impl From<CarrierError> for Error {
    fn from(err: CarrierError) -> Self {
        match err {
            CarrierError::Package(e) => Error::from(e),
            other => Error::Carrier(other),
        }
    }
}

impl From<ParseDiagnostics> for Error {
    fn from(err: ParseDiagnostics) -> Self {
        Error::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_classification() {
        let full: Error = io::Error::from(io::ErrorKind::StorageFull).into();
        assert!(full.is_fatal());
        assert_eq!(full.fatal(), Some(FatalError::StorageFull));

        let nested: Error = PackageError::Io(io::Error::from(io::ErrorKind::OutOfMemory)).into();
        assert_eq!(nested.fatal(), Some(FatalError::OutOfMemory));

        let missing: Error = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(!missing.is_fatal());
        assert_eq!(missing.category(), "io");
    }

    #[test]
    fn test_subsystem_categories() {
        let err: Error = TransactionError::AlreadyLocked("x".into()).into();
        assert_eq!(err.category(), "transaction");
        let err: Error = PackageError::MissingPart("[Content_Types].xml".into()).into();
        assert_eq!(err.category(), "package");
        assert!(err.to_string().contains("Content_Types"));
    }
}
