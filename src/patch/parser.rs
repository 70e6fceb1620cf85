//! Patch document parser and validator.
//!
//! A patch document is YAML (or JSON, which the YAML reader accepts). Its top
//! level is either a mapping with metadata and a `patches`/`operations`
//! sequence, a bare sequence of operations, or a single operation mapping.
//! Problems are collected as [`Diagnostic`]s; whether they reject the
//! document depends on the [`ValidationLevel`].

use crate::common::value::{PatchValue, Scalar};
use crate::opc::DocumentFormat;
use crate::opc::constants::target_mode;
use crate::patch::diagnostics::{
    Diagnostic, DiagnosticKind, ParseDiagnostics, Severity, ValidationLevel,
};
use crate::patch::model::{
    InsertPosition, Operation, OperationKind, PatchMetadata, PatchOperation, PatchSet,
    RelationshipSpec,
};
use crate::patch::substitute::{placeholders, substitute_value};
use crate::xml::XPath;
use indexmap::IndexMap;

const TOP_LEVEL_FIELDS: &[&str] = &[
    "version",
    "description",
    "author",
    "target_formats",
    "variables",
    "dependencies",
    "namespaces",
    "patches",
    "operations",
];

const OPERATION_FIELDS: &[&str] = &[
    "operation",
    "target",
    "value",
    "position",
    "namespaces",
    "part",
    "required",
    "description",
];

/// Outcome of parsing one patch document.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub success: bool,
    /// Operations that validated; empty when the document failed to parse
    pub patch_set: PatchSet,
    /// Diagnostics with severities as seen at `level`
    pub diagnostics: Vec<Diagnostic>,
    pub level: ValidationLevel,
}

impl ParseResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_result(self) -> Result<PatchSet, ParseDiagnostics> {
        if self.success {
            Ok(self.patch_set)
        } else {
            Err(ParseDiagnostics {
                diagnostics: self.diagnostics,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchParser {
    level: ValidationLevel,
}

impl PatchParser {
    pub fn new(level: ValidationLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        let mut diags = Vec::new();
        let patch_set = match serde_saphyr::from_str::<PatchValue>(text) {
            Ok(document) => self.parse_document(&document, &mut diags),
            Err(e) => {
                diags.push(Diagnostic::error(
                    DiagnosticKind::Syntax,
                    format!("malformed patch document: {}", e),
                ));
                PatchSet::default()
            },
        };

        let success = !diags.iter().any(|d| d.fails(self.level));
        for d in diags.iter().filter(|d| d.severity == Severity::Warning) {
            tracing::warn!(diagnostic = %d, "patch document");
        }
        for d in &mut diags {
            d.severity = d.effective_severity(self.level);
        }
        tracing::debug!(
            operations = patch_set.operations.len(),
            diagnostics = diags.len(),
            success,
            "patch document parsed"
        );

        ParseResult {
            success,
            patch_set,
            diagnostics: diags,
            level: self.level,
        }
    }

    fn parse_document(&self, document: &PatchValue, diags: &mut Vec<Diagnostic>) -> PatchSet {
        let mut set = PatchSet::default();
        let raw_operations: Vec<PatchValue> = match document {
            PatchValue::Sequence(items) => items.clone(),
            PatchValue::Mapping(map)
                if map.contains_key("operation")
                    && !map.contains_key("patches")
                    && !map.contains_key("operations") =>
            {
                vec![document.clone()]
            },
            PatchValue::Mapping(map) => {
                set.metadata = parse_metadata(map, diags);
                operations_list(map, diags)
            },
            PatchValue::Scalar(Scalar::Null) => {
                diags.push(Diagnostic::error(DiagnosticKind::Syntax, "empty patch document"));
                return set;
            },
            PatchValue::Scalar(s) => {
                diags.push(Diagnostic::error(
                    DiagnosticKind::Syntax,
                    format!(
                        "patch document must be a mapping or a sequence, found {}",
                        s.type_name()
                    ),
                ));
                return set;
            },
        };

        for (index, raw) in raw_operations.iter().enumerate() {
            let mut unresolved = Vec::new();
            let raw = substitute_value(raw, &set.metadata.variables, &mut unresolved);
            for name in unresolved {
                diags.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnresolvedVariable,
                        format!("variable '{}' is not defined; left as '${{{}}}'", name, name),
                    )
                    .at(Some(index), None),
                );
            }
            if let Some(op) = parse_operation(index, &raw, diags) {
                set.operations.push(op);
            }
        }
        set
    }
}

/// Parse with the default ([`ValidationLevel::Lenient`]) level.
pub fn parse(text: &str) -> Result<PatchSet, ParseDiagnostics> {
    PatchParser::default().parse(text).into_result()
}

fn operations_list(map: &IndexMap<String, PatchValue>, diags: &mut Vec<Diagnostic>) -> Vec<PatchValue> {
    let (key, value) = match (map.get("patches"), map.get("operations")) {
        (Some(patches), Some(_)) => {
            diags.push(
                Diagnostic::warning(
                    DiagnosticKind::InvalidValue,
                    "both 'patches' and 'operations' given; 'operations' is ignored",
                )
                .at(None, Some("operations")),
            );
            ("patches", patches)
        },
        (Some(patches), None) => ("patches", patches),
        (None, Some(operations)) => ("operations", operations),
        (None, None) => {
            diags.push(
                Diagnostic::error(DiagnosticKind::MissingField, "no 'patches' sequence")
                    .at(None, Some("patches")),
            );
            return Vec::new();
        },
    };
    match value {
        PatchValue::Sequence(items) => items.clone(),
        PatchValue::Scalar(Scalar::Null) => Vec::new(),
        other => {
            diags.push(
                Diagnostic::error(
                    DiagnosticKind::TypeMismatch,
                    format!("'{}' must be a sequence, found {}", key, other.type_name()),
                )
                .at(None, Some(key)),
            );
            Vec::new()
        },
    }
}

fn parse_metadata(map: &IndexMap<String, PatchValue>, diags: &mut Vec<Diagnostic>) -> PatchMetadata {
    let mut meta = PatchMetadata::default();

    for key in map.keys().filter(|k| !TOP_LEVEL_FIELDS.contains(&k.as_str())) {
        diags.push(
            Diagnostic::warning(DiagnosticKind::UnknownField, format!("unknown field '{}'", key))
                .at(None, Some(key)),
        );
    }

    meta.version = map.get("version").and_then(|v| scalar_text(v, None, "version", diags));
    meta.description = map
        .get("description")
        .and_then(|v| string_field(v, None, "description", diags));
    meta.author = map.get("author").and_then(|v| string_field(v, None, "author", diags));

    if let Some(value) = map.get("target_formats") {
        let items: Vec<&PatchValue> = match value {
            PatchValue::Sequence(items) => items.iter().collect(),
            single @ PatchValue::Scalar(_) => vec![single],
            other => {
                diags.push(type_mismatch(None, "target_formats", "a sequence", other));
                Vec::new()
            },
        };
        for item in items {
            match item.as_str().map(str::parse::<DocumentFormat>) {
                Some(Ok(format)) => meta.target_formats.push(format),
                _ => diags.push(
                    Diagnostic::error(
                        DiagnosticKind::InvalidEnum,
                        format!(
                            "unknown target format {}; expected potx, dotx, xltx, pptx, docx or xlsx",
                            describe(item)
                        ),
                    )
                    .at(None, Some("target_formats")),
                ),
            }
        }
    }

    if let Some(value) = map.get("variables") {
        match value {
            PatchValue::Mapping(vars) => meta.variables = vars.clone(),
            PatchValue::Scalar(Scalar::Null) => {},
            other => diags.push(type_mismatch(None, "variables", "a mapping", other)),
        }
    }

    if let Some(value) = map.get("dependencies") {
        match value {
            PatchValue::Sequence(items) => {
                for item in items {
                    match item.as_str() {
                        Some(name) => meta.dependencies.push(name.to_string()),
                        None => diags.push(type_mismatch(None, "dependencies", "a string", item)),
                    }
                }
            },
            PatchValue::Scalar(Scalar::Null) => {},
            other => diags.push(type_mismatch(None, "dependencies", "a sequence", other)),
        }
    }

    if let Some(value) = map.get("namespaces") {
        meta.namespaces = namespace_field(value, None, diags);
    }

    meta
}

fn parse_operation(index: usize, raw: &PatchValue, diags: &mut Vec<Diagnostic>) -> Option<PatchOperation> {
    let at = Some(index);
    let Some(map) = raw.as_mapping() else {
        diags.push(
            Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                format!("operation must be a mapping, found {}; skipped", raw.type_name()),
            )
            .at(at, None),
        );
        return None;
    };

    for key in map.keys().filter(|k| !OPERATION_FIELDS.contains(&k.as_str())) {
        diags.push(
            Diagnostic::warning(DiagnosticKind::UnknownField, format!("unknown field '{}'", key))
                .at(at, Some(key)),
        );
    }

    let kind = match map.get("operation") {
        None => {
            diags.push(
                Diagnostic::error(DiagnosticKind::MissingField, "missing 'operation'")
                    .at(at, Some("operation")),
            );
            None
        },
        Some(value) => match value.as_str().map(str::parse::<OperationKind>) {
            Some(Ok(kind)) => Some(kind),
            _ => {
                diags.push(
                    Diagnostic::error(
                        DiagnosticKind::UnsupportedOperation,
                        format!(
                            "unsupported operation {}; expected one of set, insert, extend, merge, relsAdd",
                            describe(value)
                        ),
                    )
                    .at(at, Some("operation")),
                );
                None
            },
        },
    };

    let target = parse_target(index, map.get("target"), diags);

    let position = match map.get("position") {
        None => InsertPosition::default(),
        Some(value) => {
            if kind.is_some_and(|k| k != OperationKind::Insert) {
                diags.push(
                    Diagnostic::warning(
                        DiagnosticKind::InvalidValue,
                        "'position' only applies to insert and is ignored",
                    )
                    .at(at, Some("position")),
                );
            }
            match value.as_str().map(str::parse::<InsertPosition>) {
                Some(Ok(position)) => position,
                _ => {
                    diags.push(
                        Diagnostic::error(
                            DiagnosticKind::InvalidEnum,
                            format!(
                                "invalid position {}; expected append, prepend, before or after",
                                describe(value)
                            ),
                        )
                        .at(at, Some("position")),
                    );
                    InsertPosition::default()
                },
            }
        },
    };

    let namespaces = map
        .get("namespaces")
        .map(|v| namespace_field(v, at, diags))
        .unwrap_or_default();
    let part = map.get("part").and_then(|v| string_field(v, at, "part", diags));
    let description = map
        .get("description")
        .and_then(|v| string_field(v, at, "description", diags));
    let required = match map.get("required") {
        None => false,
        Some(PatchValue::Scalar(Scalar::Bool(b))) => *b,
        Some(other) => {
            diags.push(type_mismatch(at, "required", "a boolean", other));
            false
        },
    };

    let kind = kind?;
    let operation = match map.get("value") {
        None => {
            diags.push(
                Diagnostic::error(
                    DiagnosticKind::MissingField,
                    format!("'{}' requires a 'value'", kind),
                )
                .at(at, Some("value")),
            );
            return None;
        },
        Some(value) => parse_payload(kind, value, position, index, diags)?,
    };

    Some(PatchOperation {
        operation,
        target: target?,
        namespaces,
        part,
        required,
        description,
    })
}

fn parse_target(index: usize, value: Option<&PatchValue>, diags: &mut Vec<Diagnostic>) -> Option<String> {
    let at = Some(index);
    let Some(value) = value else {
        diags.push(
            Diagnostic::error(DiagnosticKind::MissingField, "missing 'target'").at(at, Some("target")),
        );
        return None;
    };
    let Some(target) = value.as_str() else {
        diags.push(type_mismatch(at, "target", "a string", value));
        return None;
    };
    if target.trim().is_empty() {
        diags.push(
            Diagnostic::error(DiagnosticKind::MissingField, "'target' is empty").at(at, Some("target")),
        );
        return None;
    }
    // Targets still carrying placeholders are checked once variables are bound.
    if placeholders(target).is_empty()
        && let Err(e) = XPath::parse(target)
    {
        diags.push(
            Diagnostic::error(DiagnosticKind::Syntax, format!("invalid XPath '{}': {}", target, e))
                .at(at, Some("target")),
        );
        return None;
    }
    Some(target.to_string())
}

fn parse_payload(
    kind: OperationKind,
    value: &PatchValue,
    position: InsertPosition,
    index: usize,
    diags: &mut Vec<Diagnostic>,
) -> Option<Operation> {
    let at = Some(index);
    match kind {
        OperationKind::Set => match value {
            PatchValue::Scalar(scalar) => Some(Operation::Set {
                value: scalar.clone(),
            }),
            other => {
                diags.push(type_mismatch(at, "value", "a scalar for set", other));
                None
            },
        },
        OperationKind::Insert => match fragment_text(value) {
            Some(fragment) => Some(Operation::Insert { fragment, position }),
            None => {
                diags.push(type_mismatch(at, "value", "an XML fragment string", value));
                None
            },
        },
        OperationKind::Extend => {
            let items: Vec<&PatchValue> = match value {
                PatchValue::Sequence(items) => items.iter().collect(),
                single => {
                    diags.push(type_mismatch(at, "value", "a sequence for extend", single));
                    vec![single]
                },
            };
            let mut fragments = Vec::with_capacity(items.len());
            for item in items {
                match fragment_text(item) {
                    Some(fragment) => fragments.push(fragment),
                    None => diags.push(type_mismatch(at, "value", "an XML fragment string", item)),
                }
            }
            Some(Operation::Extend { fragments })
        },
        OperationKind::Merge => match value {
            PatchValue::Mapping(entries) => Some(Operation::Merge {
                entries: entries.clone(),
            }),
            other => {
                diags.push(type_mismatch(at, "value", "a mapping for merge", other));
                None
            },
        },
        OperationKind::RelationshipAdd => {
            let Some(map) = value.as_mapping() else {
                diags.push(type_mismatch(at, "value", "a mapping with Id, Type and Target", value));
                return None;
            };
            let mut required = |key: &str| -> Option<String> {
                match map.get(key).and_then(PatchValue::as_scalar) {
                    Some(Scalar::Null) | None => {
                        diags.push(
                            Diagnostic::error(
                                DiagnosticKind::MissingField,
                                format!("relsAdd value requires '{}'", key),
                            )
                            .at(at, Some("value")),
                        );
                        None
                    },
                    Some(scalar) => Some(scalar.to_text()),
                }
            };
            let id = required("Id");
            let reltype = required("Type");
            let target = required("Target");
            let target_mode = match map.get("TargetMode").and_then(PatchValue::as_str) {
                None => None,
                Some(mode) if mode == target_mode::INTERNAL || mode == target_mode::EXTERNAL => {
                    Some(mode.to_string())
                },
                Some(mode) => {
                    diags.push(
                        Diagnostic::error(
                            DiagnosticKind::InvalidEnum,
                            format!("invalid TargetMode '{}'; expected Internal or External", mode),
                        )
                        .at(at, Some("value")),
                    );
                    None
                },
            };
            Some(Operation::RelationshipAdd {
                relationship: RelationshipSpec {
                    id: id?,
                    reltype: reltype?,
                    target: target?,
                    target_mode,
                },
            })
        },
    }
}

fn fragment_text(value: &PatchValue) -> Option<String> {
    match value {
        PatchValue::Scalar(Scalar::Null) => None,
        PatchValue::Scalar(scalar) => Some(scalar.to_text()),
        _ => None,
    }
}

fn namespace_field(value: &PatchValue, at: Option<usize>, diags: &mut Vec<Diagnostic>) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    match value {
        PatchValue::Mapping(map) => {
            for (prefix, uri) in map {
                match uri.as_str() {
                    Some(uri) => {
                        out.insert(prefix.clone(), uri.to_string());
                    },
                    None => diags.push(type_mismatch(at, "namespaces", "a URI string", uri)),
                }
            }
        },
        PatchValue::Scalar(Scalar::Null) => {},
        other => diags.push(type_mismatch(at, "namespaces", "a mapping", other)),
    }
    out
}

fn string_field(value: &PatchValue, at: Option<usize>, field: &str, diags: &mut Vec<Diagnostic>) -> Option<String> {
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            diags.push(type_mismatch(at, field, "a string", value));
            None
        },
    }
}

fn scalar_text(value: &PatchValue, at: Option<usize>, field: &str, diags: &mut Vec<Diagnostic>) -> Option<String> {
    match value.as_scalar() {
        Some(Scalar::Null) => None,
        Some(scalar) => Some(scalar.to_text()),
        None => {
            diags.push(type_mismatch(at, field, "a scalar", value));
            None
        },
    }
}

fn type_mismatch(at: Option<usize>, field: &str, expected: &str, found: &PatchValue) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::TypeMismatch,
        format!("'{}' must be {}, found {}", field, expected, found.type_name()),
    )
    .at(at, Some(field))
}

fn describe(value: &PatchValue) -> String {
    match value.as_scalar() {
        Some(Scalar::String(s)) => format!("'{}'", s),
        Some(other) => other.to_text(),
        None => value.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lenient(text: &str) -> ParseResult {
        PatchParser::new(ValidationLevel::Lenient).parse(text)
    }

    fn kinds(result: &ParseResult) -> Vec<DiagnosticKind> {
        result.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_full_document() {
        let text = r#"
version: "1.2"
description: Brand refresh
author: design-ops
target_formats: [potx, dotx]
variables:
  brand: Acme
dependencies: [base-theme]
namespaces:
  t: urn:test
patches:
  - operation: set
    target: //title/@text
    value: ${brand} Quarterly
  - operation: insert
    target: //p:spTree
    position: prepend
    value: <p:sp/>
  - operation: extend
    target: //a:clrScheme
    value: ["<a:accent7/>", "<a:accent8/>"]
  - operation: merge
    target: //a:theme
    value:
      "@name": Acme
      a:themeElements:
        a:fmtScheme: null
  - operation: relsAdd
    target: /rel:Relationships
    part: ppt/_rels/presentation.xml.rels
    required: true
    value: {Id: rId9, Type: "http://example.com/rel", Target: "https://acme.example", TargetMode: External}
"#;
        let result = lenient(text);
        assert!(result.success, "{:?}", result.diagnostics);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

        let set = result.patch_set;
        assert_eq!(set.metadata.version.as_deref(), Some("1.2"));
        assert_eq!(set.metadata.author.as_deref(), Some("design-ops"));
        assert_eq!(set.metadata.target_formats, vec![DocumentFormat::Potx, DocumentFormat::Dotx]);
        assert_eq!(set.metadata.dependencies, vec!["base-theme".to_string()]);
        assert_eq!(set.metadata.namespaces.get("t").map(String::as_str), Some("urn:test"));
        assert_eq!(set.operations.len(), 5);

        assert_eq!(
            set.operations[0].operation,
            Operation::Set {
                value: Scalar::String("Acme Quarterly".into())
            }
        );
        assert_eq!(
            set.operations[1].operation,
            Operation::Insert {
                fragment: "<p:sp/>".into(),
                position: InsertPosition::Prepend
            }
        );
        match &set.operations[2].operation {
            Operation::Extend { fragments } => assert_eq!(fragments.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(set.operations[3].kind(), OperationKind::Merge);
        let rels = &set.operations[4];
        assert!(rels.required);
        assert_eq!(rels.part.as_deref(), Some("ppt/_rels/presentation.xml.rels"));
        match &rels.operation {
            Operation::RelationshipAdd { relationship } => {
                assert_eq!(relationship.id, "rId9");
                assert!(relationship.is_external());
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bare_sequence_and_single_operation() {
        let seq = lenient("- {operation: set, target: //a/@b, value: x}\n");
        assert!(seq.success);
        assert_eq!(seq.patch_set.operations.len(), 1);

        let single = lenient("operation: set\ntarget: //a/@b\nvalue: 3\n");
        assert!(single.success);
        assert_eq!(
            single.patch_set.operations[0].operation,
            Operation::Set { value: Scalar::Int(3) }
        );

        let json = lenient(r#"{"operations": [{"operation": "set", "target": "//a", "value": "v"}]}"#);
        assert!(json.success, "{:?}", json.diagnostics);
        assert_eq!(json.patch_set.operations.len(), 1);
    }

    #[test]
    fn test_syntax_error_yields_empty_set() {
        let result = lenient("patches: [unclosed\n");
        assert!(!result.success);
        assert_eq!(kinds(&result), vec![DiagnosticKind::Syntax]);
        assert!(result.patch_set.operations.is_empty());
    }

    #[test]
    fn test_invalid_xpath_is_syntax_error() {
        let result = PatchParser::new(ValidationLevel::Permissive)
            .parse("- {operation: set, target: '//a[', value: x}\n");
        assert!(!result.success);
        assert_eq!(kinds(&result), vec![DiagnosticKind::Syntax]);
    }

    #[test]
    fn test_missing_fields_and_unsupported_operation() {
        let result = PatchParser::new(ValidationLevel::Permissive).parse(
            "- {operation: set, value: x}\n- {operation: delete, target: //a, value: x}\n- {operation: relsAdd, target: /rel:Relationships, value: {Id: rId1}}\n",
        );
        assert!(!result.success);
        let kinds = kinds(&result);
        assert!(kinds.contains(&DiagnosticKind::MissingField));
        assert!(kinds.contains(&DiagnosticKind::UnsupportedOperation));
        assert!(result.patch_set.operations.is_empty());
    }

    #[test]
    fn test_levels_on_soft_errors() {
        let text = "- {operation: insert, target: //a, position: sideways, value: <b/>}\n";
        assert!(!PatchParser::new(ValidationLevel::Strict).parse(text).success);
        assert!(!PatchParser::new(ValidationLevel::Lenient).parse(text).success);
        let permissive = PatchParser::new(ValidationLevel::Permissive).parse(text);
        assert!(permissive.success);
        assert_eq!(permissive.warnings().count(), 1);
        assert_eq!(permissive.patch_set.operations.len(), 1);
    }

    #[test]
    fn test_warnings_fail_only_strict() {
        let text = "- {operation: set, target: //a, value: '${nope}', colour: red}\n";
        let strict = PatchParser::new(ValidationLevel::Strict).parse(text);
        assert!(!strict.success);
        let lenient = lenient(text);
        assert!(lenient.success);
        let kinds = kinds(&lenient);
        assert!(kinds.contains(&DiagnosticKind::UnresolvedVariable));
        assert!(kinds.contains(&DiagnosticKind::UnknownField));
        assert_eq!(
            lenient.patch_set.operations[0].operation,
            Operation::Set {
                value: Scalar::String("${nope}".into())
            }
        );
    }

    #[test]
    fn test_extend_requires_sequence() {
        let text = "- {operation: extend, target: //a, value: <b/>}\n";
        let result = lenient(text);
        assert!(!result.success);
        assert_eq!(kinds(&result), vec![DiagnosticKind::TypeMismatch]);
        // The scalar is coerced to a one-item sequence rather than dropped.
        assert_eq!(result.patch_set.operations.len(), 1);
        let permissive = PatchParser::new(ValidationLevel::Permissive).parse(text);
        assert!(permissive.success);
        assert_eq!(
            permissive.patch_set.operations[0].operation,
            Operation::Extend {
                fragments: vec!["<b/>".into()]
            }
        );
    }

    #[test]
    fn test_placeholder_target_deferred() {
        let result = lenient("- {operation: set, target: '//${element}/@val', value: x}\n");
        assert!(result.success);
        assert_eq!(kinds(&result), vec![DiagnosticKind::UnresolvedVariable]);
    }

    #[test]
    fn test_parse_shortcut() {
        assert!(parse("- {operation: set, target: //a, value: x}\n").is_ok());
        let err = parse("42").unwrap_err();
        assert_eq!(err.errors().count(), 1);
    }

    fn arb_operation() -> impl Strategy<Value = String> {
        let op = prop_oneof![
            Just("set"),
            Just("insert"),
            Just("extend"),
            Just("merge"),
            Just("relsAdd"),
            Just("remove")
        ];
        let target = prop_oneof![Just("//a"), Just("//a[1]/@b"), Just("//a["), Just("")];
        let value = prop_oneof![
            Just("x"),
            Just("'<b/>'"),
            Just("['<b/>']"),
            Just("{Id: r1, Type: t, Target: x}"),
            Just("{k: v}")
        ];
        let extra = prop_oneof![Just(""), Just(", position: after"), Just(", position: bogus"), Just(", junk: 1")];
        (op, target, value, extra).prop_map(|(op, target, value, extra)| {
            format!("- {{operation: {}, target: '{}', value: {}{}}}\n", op, target, value, extra)
        })
    }

    proptest! {
        #[test]
        fn test_strict_acceptance_implies_permissive(ops in proptest::collection::vec(arb_operation(), 1..4)) {
            let text = ops.concat();
            let strict = PatchParser::new(ValidationLevel::Strict).parse(&text).success;
            let lenient = PatchParser::new(ValidationLevel::Lenient).parse(&text).success;
            let permissive = PatchParser::new(ValidationLevel::Permissive).parse(&text).success;
            prop_assert!(!strict || lenient);
            prop_assert!(!lenient || permissive);
        }
    }
}
