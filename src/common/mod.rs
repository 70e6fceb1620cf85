//! Common types and utilities shared across subsystems.
//!
//! Unit and color math, the tagged value type patch documents and token
//! layers are read into, XML text helpers, and the unified error type.

pub mod color;
pub mod error;
pub mod unit;
pub mod value;
pub mod xml;

pub use color::{Hsl, RGBColor};
pub use error::{Error, FatalError, Result};
pub use unit::{Emu, LengthUnit, UnitError};
pub use value::{PatchValue, Scalar};
