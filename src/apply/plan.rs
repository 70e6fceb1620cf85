//! Planning and execution of one patch operation against one tree.
//!
//! Planning resolves targets, checks the value and parses fragments without
//! touching the tree. Execution only performs mutations the plan already
//! proved valid, so a failing operation never leaves a partial change.

use crate::apply::error::{ApplyError, ApplyErrorKind, Result};
use crate::common::value::{PatchValue, Scalar};
use crate::patch::{InsertPosition, Operation, PatchOperation, RelationshipSpec};
use crate::xml::{NamespaceMap, NodeId, NodeKind, QName, XNode, XPath, XmlDocument};
use indexmap::IndexMap;

/// A namespace declaration to add to an element that gains a prefix bound
/// only by the operation's namespace map.
type Declaration = (String, String);

#[derive(Debug)]
pub(crate) enum Action {
    SetAttribute {
        element: NodeId,
        name: QName,
        value: String,
    },
    SetText {
        node: NodeId,
        value: String,
    },
    Insert {
        anchor: NodeId,
        position: InsertPosition,
        /// Fragment index into [`Plan::fragments`] plus declarations for each
        /// of its top-level elements
        fragments: Vec<(usize, Vec<Vec<Declaration>>)>,
    },
    Merge {
        element: NodeId,
        declarations: Vec<Declaration>,
        steps: Vec<MergeStep>,
    },
    AddRelationship {
        container: NodeId,
        name: QName,
        attributes: Vec<(QName, String)>,
    },
}

#[derive(Debug)]
pub(crate) enum MergeStep {
    Attribute {
        name: QName,
        value: String,
    },
    Child {
        name: QName,
        /// Existing child to merge into; created when `None`
        existing: Option<NodeId>,
        declarations: Vec<Declaration>,
        text: Option<String>,
        children: Vec<MergeStep>,
    },
}

/// Validated mutations for one operation on one tree.
#[derive(Debug, Default)]
pub struct Plan {
    pub(crate) actions: Vec<Action>,
    pub(crate) fragments: Vec<XmlDocument>,
}

impl Plan {
    /// Number of target nodes the plan mutates.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

pub(crate) fn plan(doc: &XmlDocument, op: &PatchOperation, namespaces: &NamespaceMap) -> Result<Plan> {
    let xpath = XPath::parse(&op.target).map_err(|e| ApplyError::from_xpath(&op.target, e))?;
    let targets = xpath
        .select(doc, namespaces)
        .map_err(|e| ApplyError::from_xpath(&op.target, e))?;

    let mut plan = Plan::default();
    if targets.is_empty() {
        return Ok(plan);
    }

    match &op.operation {
        Operation::Set { value } => {
            let text = value.to_text();
            for target in targets {
                plan.actions.push(plan_set(doc, target, &text)?);
            }
        },
        Operation::Insert { fragment, position } => {
            plan.fragments.push(parse_fragment(fragment)?);
            for target in &targets {
                let action = plan_insert(doc, target, *position, &plan.fragments, &[0], namespaces)?;
                plan.actions.push(action);
            }
        },
        Operation::Extend { fragments } => {
            if fragments.is_empty() {
                return Err(ApplyError::new(
                    ApplyErrorKind::InvalidValue,
                    "extend needs at least one fragment",
                ));
            }
            for fragment in fragments {
                plan.fragments.push(parse_fragment(fragment)?);
            }
            let indices: Vec<usize> = (0..plan.fragments.len()).collect();
            for target in &targets {
                let action = plan_insert(
                    doc,
                    target,
                    InsertPosition::Append,
                    &plan.fragments,
                    &indices,
                    namespaces,
                )?;
                plan.actions.push(action);
            }
        },
        Operation::Merge { entries } => {
            for target in &targets {
                let element = require_element(doc, target, "merge")?;
                let mut declarations = Vec::new();
                let steps = plan_merge(
                    doc,
                    element,
                    Some(element),
                    entries,
                    namespaces,
                    &mut declarations,
                )?;
                plan.actions.push(Action::Merge {
                    element,
                    declarations,
                    steps,
                });
            }
        },
        Operation::RelationshipAdd { relationship } => {
            for target in &targets {
                plan.actions.push(plan_relationship(doc, target, relationship)?);
            }
        },
    }

    Ok(plan)
}

fn plan_set(doc: &XmlDocument, target: XNode, text: &str) -> Result<Action> {
    match target {
        XNode::Attribute { element, name } => Ok(Action::SetAttribute {
            element,
            name,
            value: text.to_string(),
        }),
        XNode::Node(node) => match doc.kind(node) {
            NodeKind::Element(_) | NodeKind::Text(_) | NodeKind::CData(_) | NodeKind::Comment(_) => {
                Ok(Action::SetText {
                    node,
                    value: text.to_string(),
                })
            },
            _ => Err(ApplyError::new(
                ApplyErrorKind::StructuralConflict,
                "set can only target elements, attributes or character data",
            )),
        },
    }
}

fn require_element(doc: &XmlDocument, target: &XNode, op: &str) -> Result<NodeId> {
    match target {
        XNode::Node(id) if doc.is_element(*id) => Ok(*id),
        XNode::Attribute { name, .. } => Err(ApplyError::new(
            ApplyErrorKind::StructuralConflict,
            format!("{} cannot target attribute '{}'", op, name),
        )),
        XNode::Node(_) => Err(ApplyError::new(
            ApplyErrorKind::StructuralConflict,
            format!("{} must target an element", op),
        )),
    }
}

fn parse_fragment(text: &str) -> Result<XmlDocument> {
    let fragment = XmlDocument::parse_fragment(text).map_err(|e| {
        ApplyError::new(ApplyErrorKind::FragmentParse, format!("fragment '{}': {}", text, e))
    })?;
    let has_content = fragment.children(fragment.root()).iter().any(|&c| match fragment.kind(c) {
        NodeKind::Element(_) => true,
        NodeKind::Text(t) => !t.trim().is_empty(),
        _ => false,
    });
    if !has_content {
        return Err(ApplyError::new(
            ApplyErrorKind::InvalidValue,
            "fragment has no elements or text",
        ));
    }
    Ok(fragment)
}

fn plan_insert(
    doc: &XmlDocument,
    target: &XNode,
    position: InsertPosition,
    fragments: &[XmlDocument],
    indices: &[usize],
    namespaces: &NamespaceMap,
) -> Result<Action> {
    let anchor = match (target, position) {
        (XNode::Attribute { name, .. }, _) => {
            return Err(ApplyError::new(
                ApplyErrorKind::StructuralConflict,
                format!("cannot insert relative to attribute '{}'", name),
            ));
        },
        (XNode::Node(id), _) => *id,
    };

    let scope = match position {
        InsertPosition::Append | InsertPosition::Prepend => {
            if !doc.is_element(anchor) {
                return Err(ApplyError::new(
                    ApplyErrorKind::StructuralConflict,
                    "children can only be inserted into elements",
                ));
            }
            anchor
        },
        InsertPosition::Before | InsertPosition::After => match doc.parent(anchor) {
            Some(parent) if doc.is_element(parent) => parent,
            _ => {
                return Err(ApplyError::new(
                    ApplyErrorKind::StructuralConflict,
                    "cannot insert a sibling of the document element",
                ));
            },
        },
    };

    let mut planned = Vec::with_capacity(indices.len());
    for &index in indices {
        let fragment = &fragments[index];
        let mut per_root = Vec::new();
        for &root in fragment.children(fragment.root()) {
            if fragment.is_element(root) {
                per_root.push(fragment_declarations(doc, scope, fragment, root, namespaces)?);
            }
        }
        planned.push((index, per_root));
    }

    Ok(Action::Insert {
        anchor,
        position,
        fragments: planned,
    })
}

/// Declarations a fragment root needs for prefixes that neither the fragment
/// nor the insertion scope binds.
fn fragment_declarations(
    doc: &XmlDocument,
    scope: NodeId,
    fragment: &XmlDocument,
    root: NodeId,
    namespaces: &NamespaceMap,
) -> Result<Vec<Declaration>> {
    let mut declarations: Vec<Declaration> = Vec::new();
    for node in fragment.descendants(root) {
        let Some(element) = fragment.element(node) else {
            continue;
        };
        let prefixes = std::iter::once(element.name.prefix())
            .chain(element.attributes.iter().map(|a| a.name.prefix()))
            .flatten();
        for prefix in prefixes {
            if fragment.lookup_namespace(node, Some(prefix)).is_some()
                || doc.lookup_namespace(scope, Some(prefix)).is_some()
                || declarations.iter().any(|(p, _)| p == prefix)
            {
                continue;
            }
            match namespaces.get(prefix) {
                Some(uri) => declarations.push((prefix.to_string(), uri.to_string())),
                None => {
                    return Err(ApplyError::new(
                        ApplyErrorKind::UnboundPrefix,
                        format!("fragment prefix '{}' is not bound", prefix),
                    ));
                },
            }
        }
    }
    Ok(declarations)
}

/// Resolve the namespace for a prefix introduced by a merge key.
///
/// Returns the declaration to add when the prefix is bound only by the
/// namespace map.
fn resolve_prefix(
    doc: &XmlDocument,
    scope: NodeId,
    prefix: Option<&str>,
    namespaces: &NamespaceMap,
    pending: &[Declaration],
) -> Result<(Option<String>, Option<Declaration>)> {
    let Some(prefix) = prefix else {
        return Ok((doc.lookup_namespace(scope, None).map(str::to_string), None));
    };
    if let Some(uri) = doc.lookup_namespace(scope, Some(prefix)) {
        return Ok((Some(uri.to_string()), None));
    }
    if let Some((_, uri)) = pending.iter().find(|(p, _)| p == prefix) {
        return Ok((Some(uri.clone()), None));
    }
    match namespaces.get(prefix) {
        Some(uri) => Ok((
            Some(uri.to_string()),
            Some((prefix.to_string(), uri.to_string())),
        )),
        None => Err(ApplyError::new(
            ApplyErrorKind::UnboundPrefix,
            format!("merge key prefix '{}' is not bound", prefix),
        )),
    }
}

/// Plan a merge of `entries` into `element` (or into an element that will be
/// created, when `existing` is `None`; `scope` is then the nearest existing
/// ancestor for prefix lookup).
fn plan_merge(
    doc: &XmlDocument,
    scope: NodeId,
    existing: Option<NodeId>,
    entries: &IndexMap<String, PatchValue>,
    namespaces: &NamespaceMap,
    declarations: &mut Vec<Declaration>,
) -> Result<Vec<MergeStep>> {
    let mut steps = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if let Some(attr) = key.strip_prefix('@') {
            let name = QName::parse(attr);
            if name.local.is_empty() {
                return Err(ApplyError::new(ApplyErrorKind::InvalidValue, "empty attribute name in merge"));
            }
            let value = match value {
                PatchValue::Scalar(s) => s.to_text(),
                other => {
                    return Err(ApplyError::new(
                        ApplyErrorKind::InvalidValue,
                        format!("attribute '{}' needs a scalar, found {}", attr, other.type_name()),
                    ));
                },
            };
            if name.prefix() != Some("xml") {
                let (_, declare) = resolve_prefix(doc, scope, name.prefix(), namespaces, declarations)?;
                declarations.extend(declare);
            }
            steps.push(MergeStep::Attribute { name, value });
            continue;
        }

        let name = QName::parse(key);
        if name.local.is_empty() {
            return Err(ApplyError::new(ApplyErrorKind::InvalidValue, "empty element name in merge"));
        }
        let mut child_declarations = Vec::new();
        let (uri, declare) = resolve_prefix(doc, scope, name.prefix(), namespaces, declarations)?;
        child_declarations.extend(declare);

        let found = existing.and_then(|parent| {
            doc.element_children(parent).find(|&child| {
                doc.element(child).is_some_and(|e| e.name.local == name.local)
                    && doc.element_namespace(child) == uri.as_deref()
            })
        });
        let child_scope = found.unwrap_or(scope);

        let (text, children) = match value {
            PatchValue::Scalar(Scalar::Null) => (None, Vec::new()),
            PatchValue::Scalar(s) => (Some(s.to_text()), Vec::new()),
            PatchValue::Mapping(nested) => {
                let mut inherited: Vec<Declaration> =
                    declarations.iter().chain(child_declarations.iter()).cloned().collect();
                let before = inherited.len();
                let children =
                    plan_merge(doc, child_scope, found, nested, namespaces, &mut inherited)?;
                child_declarations.extend(inherited.drain(before..));
                (None, children)
            },
            PatchValue::Sequence(_) => {
                return Err(ApplyError::new(
                    ApplyErrorKind::InvalidValue,
                    format!("merge value for '{}' must be a scalar or mapping, found sequence", key),
                ));
            },
        };

        steps.push(MergeStep::Child {
            name,
            existing: found,
            declarations: child_declarations,
            text,
            children,
        });
    }
    Ok(steps)
}

fn plan_relationship(doc: &XmlDocument, target: &XNode, spec: &RelationshipSpec) -> Result<Action> {
    let container = require_element(doc, target, "relsAdd")?;
    let duplicate = doc.element_children(container).any(|child| {
        doc.element(child)
            .and_then(|e| e.attribute_by_name("Id"))
            .is_some_and(|id| id == spec.id)
    });
    if duplicate {
        return Err(ApplyError::new(
            ApplyErrorKind::DuplicateRelationshipId,
            format!("relationship id '{}' already exists", spec.id),
        ));
    }

    let prefix = doc.element(container).and_then(|e| e.name.prefix.clone());
    let mut attributes = vec![
        (QName::new(None, "Id"), spec.id.clone()),
        (QName::new(None, "Type"), spec.reltype.clone()),
        (QName::new(None, "Target"), spec.target.clone()),
    ];
    if let Some(mode) = &spec.target_mode {
        attributes.push((QName::new(None, "TargetMode"), mode.clone()));
    }
    Ok(Action::AddRelationship {
        container,
        name: QName::new(prefix.as_deref(), "Relationship"),
        attributes,
    })
}

/// Perform the planned mutations. Returns the number of targets mutated.
pub(crate) fn execute(doc: &mut XmlDocument, plan: Plan) -> usize {
    let Plan { actions, fragments } = plan;
    let affected = actions.len();
    for action in actions {
        match action {
            Action::SetAttribute { element, name, value } => {
                if let Some(e) = doc.element_mut(element) {
                    e.set_attribute(name, value);
                }
            },
            Action::SetText { node, value } => doc.set_text(node, &value),
            Action::Insert {
                anchor,
                position,
                fragments: planned,
            } => {
                let mut imported = Vec::new();
                for (index, declarations) in planned {
                    let fragment = &fragments[index];
                    let mut declarations = declarations.into_iter();
                    for &child in fragment.children(fragment.root()) {
                        let node = doc.import(fragment, child);
                        if fragment.is_element(child)
                            && let Some(decls) = declarations.next()
                            && let Some(e) = doc.element_mut(node)
                        {
                            for (prefix, uri) in decls {
                                e.declare_namespace(Some(&prefix), &uri);
                            }
                        }
                        imported.push(node);
                    }
                }
                attach(doc, anchor, position, imported);
            },
            Action::Merge {
                element,
                declarations,
                steps,
            } => {
                if let Some(e) = doc.element_mut(element) {
                    for (prefix, uri) in &declarations {
                        e.declare_namespace(Some(prefix), uri);
                    }
                }
                execute_merge(doc, element, steps);
            },
            Action::AddRelationship {
                container,
                name,
                attributes,
            } => {
                let node = doc.create_element(name);
                if let Some(e) = doc.element_mut(node) {
                    for (name, value) in attributes {
                        e.set_attribute(name, value);
                    }
                }
                doc.append_child(container, node);
            },
        }
    }
    affected
}

fn attach(doc: &mut XmlDocument, anchor: NodeId, position: InsertPosition, nodes: Vec<NodeId>) {
    match position {
        InsertPosition::Append => {
            for node in nodes {
                doc.append_child(anchor, node);
            }
        },
        InsertPosition::Prepend => {
            for (i, node) in nodes.into_iter().enumerate() {
                doc.insert_child(anchor, i, node);
            }
        },
        InsertPosition::Before => {
            for node in nodes {
                doc.insert_before(anchor, node);
            }
        },
        InsertPosition::After => {
            let mut reference = anchor;
            for node in nodes {
                doc.insert_after(reference, node);
                reference = node;
            }
        },
    }
}

fn execute_merge(doc: &mut XmlDocument, element: NodeId, steps: Vec<MergeStep>) {
    for step in steps {
        match step {
            MergeStep::Attribute { name, value } => {
                if let Some(e) = doc.element_mut(element) {
                    e.set_attribute(name, value);
                }
            },
            MergeStep::Child {
                name,
                existing,
                declarations,
                text,
                children,
            } => {
                let child = match existing {
                    Some(child) => child,
                    None => {
                        let child = doc.create_element(name);
                        doc.append_child(element, child);
                        child
                    },
                };
                if let Some(e) = doc.element_mut(child) {
                    for (prefix, uri) in &declarations {
                        e.declare_namespace(Some(prefix), uri);
                    }
                }
                if let Some(text) = text {
                    doc.set_text(child, &text);
                }
                execute_merge(doc, child, children);
            },
        }
    }
}
