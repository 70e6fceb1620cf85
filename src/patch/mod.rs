//! Declarative patch language.
//!
//! ```
//! use kumquat::patch::{PatchParser, ValidationLevel};
//!
//! let result = PatchParser::new(ValidationLevel::Strict).parse(
//!     "patches:\n  - operation: set\n    target: //title/@text\n    value: Hello\n",
//! );
//! assert!(result.success);
//! assert_eq!(result.patch_set.operations.len(), 1);
//! ```

pub mod diagnostics;
pub mod model;
pub mod parser;
pub mod substitute;

pub use diagnostics::{
    Diagnostic, DiagnosticKind, ParseDiagnostics, Severity, SourcePosition, ValidationLevel,
};
pub use model::{
    InsertPosition, Operation, OperationKind, PatchMetadata, PatchOperation, PatchSet,
    RelationshipSpec,
};
pub use parser::{ParseResult, PatchParser, parse};
pub use substitute::{substitute_str, substitute_value};
