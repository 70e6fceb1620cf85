//! Typed patch operations and patch sets.

use crate::common::value::{PatchValue, Scalar};
use crate::opc::DocumentFormat;
use crate::opc::constants::target_mode;
use crate::xml::NamespaceMap;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "extend")]
    Extend,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "relsAdd")]
    RelationshipAdd,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Set,
        OperationKind::Insert,
        OperationKind::Extend,
        OperationKind::Merge,
        OperationKind::RelationshipAdd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Set => "set",
            OperationKind::Insert => "insert",
            OperationKind::Extend => "extend",
            OperationKind::Merge => "merge",
            OperationKind::RelationshipAdd => "relsAdd",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// Where an inserted fragment goes relative to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// Last child
    #[default]
    Append,
    /// First child
    Prepend,
    /// Preceding sibling
    Before,
    /// Following sibling
    After,
}

impl InsertPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            InsertPosition::Append => "append",
            InsertPosition::Prepend => "prepend",
            InsertPosition::Before => "before",
            InsertPosition::After => "after",
        }
    }
}

impl FromStr for InsertPosition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(InsertPosition::Append),
            "prepend" => Ok(InsertPosition::Prepend),
            "before" => Ok(InsertPosition::Before),
            "after" => Ok(InsertPosition::After),
            _ => Err(()),
        }
    }
}

/// A relationship to add with `relsAdd`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipSpec {
    pub id: String,
    pub reltype: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl RelationshipSpec {
    pub fn is_external(&self) -> bool {
        self.target_mode.as_deref() == Some(target_mode::EXTERNAL)
    }
}

/// The operation-specific payload, checked at parse time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Operation {
    /// Overwrite text content or attribute values.
    Set { value: Scalar },
    /// Attach an XML fragment relative to each target.
    Insert { fragment: String, position: InsertPosition },
    /// Append fragments in order.
    Extend { fragments: Vec<String> },
    /// Non-destructive union of child elements (`name`) and attributes (`@name`).
    Merge { entries: IndexMap<String, PatchValue> },
    /// Append a `<Relationship>` entry.
    #[serde(rename = "relsAdd")]
    RelationshipAdd { relationship: RelationshipSpec },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Set { .. } => OperationKind::Set,
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Extend { .. } => OperationKind::Extend,
            Operation::Merge { .. } => OperationKind::Merge,
            Operation::RelationshipAdd { .. } => OperationKind::RelationshipAdd,
        }
    }

    /// Rewrite every string the operation carries.
    pub fn map_strings(&self, f: &mut impl FnMut(&str) -> String) -> Operation {
        match self {
            Operation::Set { value: Scalar::String(s) } => Operation::Set {
                value: Scalar::String(f(s)),
            },
            Operation::Set { value } => Operation::Set { value: value.clone() },
            Operation::Insert { fragment, position } => Operation::Insert {
                fragment: f(fragment),
                position: *position,
            },
            Operation::Extend { fragments } => Operation::Extend {
                fragments: fragments.iter().map(|s| f(s)).collect(),
            },
            Operation::Merge { entries } => Operation::Merge {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map_strings(f)))
                    .collect(),
            },
            Operation::RelationshipAdd { relationship } => Operation::RelationshipAdd {
                relationship: RelationshipSpec {
                    id: f(&relationship.id),
                    reltype: f(&relationship.reltype),
                    target: f(&relationship.target),
                    target_mode: relationship.target_mode.as_deref().map(|m| f(m)),
                },
            },
        }
    }
}

/// One declarative instruction against the XML parts of a package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    #[serde(flatten)]
    pub operation: Operation,
    /// XPath selecting the nodes to mutate
    pub target: String,
    /// Prefix bindings layered over the patch set's namespaces
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub namespaces: IndexMap<String, String>,
    /// Part path pattern; all XML parts when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    /// Zero matches is an error rather than a warning
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PatchOperation {
    pub fn new(operation: Operation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
            namespaces: IndexMap::new(),
            part: None,
            required: false,
            description: None,
        }
    }

    pub fn set(target: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(Operation::Set { value: value.into() }, target)
    }

    pub fn insert(target: impl Into<String>, fragment: impl Into<String>, position: InsertPosition) -> Self {
        Self::new(
            Operation::Insert {
                fragment: fragment.into(),
                position,
            },
            target,
        )
    }

    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[inline]
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Effective namespace bindings: `base` with this operation's own on top.
    pub fn namespace_map(&self, base: &NamespaceMap) -> NamespaceMap {
        base.overlay(&self.namespaces)
    }

    pub fn map_strings(&self, f: &mut impl FnMut(&str) -> String) -> PatchOperation {
        PatchOperation {
            operation: self.operation.map_strings(f),
            target: f(&self.target),
            namespaces: self.namespaces.clone(),
            part: self.part.as_deref().map(|p| f(p)),
            required: self.required,
            description: self.description.clone(),
        }
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target)?;
        if let Some(part) = &self.part {
            write!(f, " in {}", part)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchMetadata {
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub target_formats: Vec<DocumentFormat>,
    /// Declared variables, after their own values were read
    pub variables: IndexMap<String, PatchValue>,
    /// Names of patch sets this one builds on
    pub dependencies: Vec<String>,
    /// Prefix bindings shared by every operation
    pub namespaces: IndexMap<String, String>,
}

/// An ordered, immutable list of operations plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchSet {
    pub metadata: PatchMetadata,
    pub operations: Vec<PatchOperation>,
}

impl PatchSet {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            metadata: PatchMetadata::default(),
            operations,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Builtin OOXML prefixes with the patch set's own bindings on top.
    pub fn namespace_map(&self) -> NamespaceMap {
        NamespaceMap::with_builtins().overlay(&self.metadata.namespaces)
    }

    /// Whether the set declares it applies to `format`. Sets declaring no
    /// formats apply to every format.
    pub fn targets_format(&self, format: DocumentFormat) -> bool {
        self.metadata.target_formats.is_empty() || self.metadata.target_formats.contains(&format)
    }
}
