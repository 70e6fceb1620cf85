use crate::common::unit::UnitError;
use serde::Serialize;
use thiserror::Error;

/// Errors from loading token layers and resolving tokens.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("circular token reference: {}", chain.join(" -> "))]
    Circular { chain: Vec<String> },

    #[error("token '{id}' is not defined in any layer")]
    Undefined { id: String },

    #[error("invalid formula for '{id}': {message}")]
    InvalidFormula { id: String, message: String },

    #[error("unit error in '{id}': {message}")]
    Unit { id: String, message: String },

    #[error("color error in '{id}': {message}")]
    Color { id: String, message: String },

    #[error("invalid token layer '{layer}': {message}")]
    Layer { layer: String, message: String },
}

impl ResolutionError {
    pub(crate) fn unit(id: &str, err: UnitError) -> Self {
        ResolutionError::Unit {
            id: id.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn formula(id: &str, message: impl Into<String>) -> Self {
        ResolutionError::InvalidFormula {
            id: id.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
