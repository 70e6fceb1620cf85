//! Diagnostics produced while parsing and validating patch documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly a patch document is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Any error or warning fails.
    Strict,
    /// Only errors fail.
    #[default]
    Lenient,
    /// Only syntax, missing-field and unsupported-operation errors fail;
    /// every other error is reported as a warning.
    Permissive,
}

impl FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationLevel::Strict),
            "lenient" => Ok(ValidationLevel::Lenient),
            "permissive" => Ok(ValidationLevel::Permissive),
            other => Err(format!("unknown validation level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed document text or XPath
    Syntax,
    MissingField,
    UnsupportedOperation,
    InvalidEnum,
    TypeMismatch,
    InvalidValue,
    UnknownField,
    UnresolvedVariable,
}

impl DiagnosticKind {
    /// Kinds that fail a document at every validation level.
    pub fn is_hard(self) -> bool {
        matches!(
            self,
            DiagnosticKind::Syntax
                | DiagnosticKind::MissingField
                | DiagnosticKind::UnsupportedOperation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::MissingField => "missing_field",
            DiagnosticKind::UnsupportedOperation => "unsupported_operation",
            DiagnosticKind::InvalidEnum => "invalid_enum",
            DiagnosticKind::TypeMismatch => "type_mismatch",
            DiagnosticKind::InvalidValue => "invalid_value",
            DiagnosticKind::UnknownField => "unknown_field",
            DiagnosticKind::UnresolvedVariable => "unresolved_variable",
        }
    }
}

/// Where in the document a diagnostic points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    /// Zero-based index of the operation, if the problem is inside one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<usize>,
    /// Field name within the operation or document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operation, &self.field) {
            (Some(op), Some(field)) => write!(f, "operation {} field '{}'", op, field),
            (Some(op), None) => write!(f, "operation {}", op),
            (None, Some(field)) => write!(f, "field '{}'", field),
            (None, None) => f.write_str("document"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            position: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            position: None,
        }
    }

    pub fn at(mut self, operation: Option<usize>, field: Option<&str>) -> Self {
        self.position = Some(SourcePosition {
            operation,
            field: field.map(str::to_string),
        });
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Severity this diagnostic carries under `level`.
    pub fn effective_severity(&self, level: ValidationLevel) -> Severity {
        match (level, self.severity) {
            (ValidationLevel::Permissive, Severity::Error) if !self.kind.is_hard() => {
                Severity::Warning
            },
            (_, severity) => severity,
        }
    }

    /// Whether this diagnostic rejects the document under `level`.
    pub fn fails(&self, level: ValidationLevel) -> bool {
        match level {
            ValidationLevel::Strict => true,
            ValidationLevel::Lenient | ValidationLevel::Permissive => {
                self.effective_severity(level) == Severity::Error
            },
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", severity, self.kind.as_str(), self.message)?;
        if let Some(position) = &self.position {
            write!(f, " (at {})", position)?;
        }
        Ok(())
    }
}

/// Diagnostics returned when a document is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseDiagnostics {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl fmt::Display for ParseDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseDiagnostics {}
