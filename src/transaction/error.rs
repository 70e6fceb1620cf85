use super::TransactionState;
use crate::apply::ApplyError;
use crate::opc::PackageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Package is already locked by another transaction: {0}")]
    AlreadyLocked(String),

    #[error("Package lock is not held: {0}")]
    NotLocked(String),

    #[error("Transaction is {actual}, expected {expected}")]
    InvalidState {
        expected: TransactionState,
        actual: TransactionState,
    },

    #[error("Operation {index} failed: {source}")]
    OperationFailed {
        index: usize,
        #[source]
        source: ApplyError,
    },

    #[error("Post-apply validation failed: {0}")]
    ValidationFailed(String),

    #[error("Rollback failed: {0}")]
    RollbackFailed(String),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;
