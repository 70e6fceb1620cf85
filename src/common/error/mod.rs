//! Unified error types for kumquat.
//!
//! Every subsystem error converts into [`Error`]; unrecoverable I/O is
//! singled out as [`FatalError`].

pub mod conversions;
pub mod types;

pub use types::{Error, FatalError, Result};
