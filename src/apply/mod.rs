//! XPath-scoped application of patch operations to XML trees.
//!
//! Every operation is planned against an immutable tree first (targets
//! resolved, values checked, fragments parsed), and only then executed. An
//! operation that fails therefore leaves the tree exactly as it was.
//!
//! ```
//! use kumquat::apply::apply;
//! use kumquat::patch::PatchOperation;
//! use kumquat::xml::{NamespaceMap, XmlDocument};
//!
//! let mut doc = XmlDocument::parse(br#"<deck><title text="Old"/></deck>"#).unwrap();
//! let op = PatchOperation::set("//title/@text", "Hello");
//! let affected = apply(&mut doc, &op, &NamespaceMap::with_builtins()).unwrap();
//! assert_eq!(affected, 1);
//! assert_eq!(doc.to_xml_string(), r#"<deck><title text="Hello"/></deck>"#);
//! ```

pub mod error;
mod plan;

pub use error::{ApplyError, ApplyErrorKind, Result};
pub use plan::Plan;

use crate::patch::PatchOperation;
use crate::xml::{NamespaceMap, XmlDocument};

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Treat a target matching zero nodes as [`ApplyErrorKind::NoMatch`]
    pub require_matches: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Applier {
    options: ApplyOptions,
}

impl Applier {
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }

    /// Resolve and validate `op` against `doc` without mutating it.
    pub fn plan(&self, doc: &XmlDocument, op: &PatchOperation, namespaces: &NamespaceMap) -> Result<Plan> {
        let plan = plan::plan(doc, op, namespaces)?;
        if plan.is_empty() && (op.required || self.options.require_matches) {
            return Err(ApplyError::new(
                ApplyErrorKind::NoMatch,
                format!("target '{}' matched no nodes", op.target),
            ));
        }
        Ok(plan)
    }

    /// Execute a plan produced by [`Applier::plan`] for the same tree.
    pub fn execute(&self, doc: &mut XmlDocument, plan: Plan) -> usize {
        plan::execute(doc, plan)
    }

    /// Plan and execute. Returns the number of nodes affected; zero matches
    /// is logged as a warning unless matches are required.
    pub fn apply(&self, doc: &mut XmlDocument, op: &PatchOperation, namespaces: &NamespaceMap) -> Result<usize> {
        let plan = self.plan(doc, op, namespaces)?;
        if plan.is_empty() {
            tracing::warn!(target_xpath = %op.target, "target matched no nodes");
            return Ok(0);
        }
        let affected = self.execute(doc, plan);
        tracing::debug!(op = %op, affected, "operation applied");
        Ok(affected)
    }
}

/// Apply `op` to `doc` with default options.
pub fn apply(doc: &mut XmlDocument, op: &PatchOperation, namespaces: &NamespaceMap) -> Result<usize> {
    Applier::default().apply(doc, op, namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::value::PatchValue;
    use crate::patch::{InsertPosition, Operation, RelationshipSpec};

    const SLIDE: &str = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:rPr sz="1800"/><a:t>One</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    fn ns() -> NamespaceMap {
        NamespaceMap::with_builtins()
    }

    fn doc(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_set_attribute_and_text() {
        let mut d = doc(SLIDE);
        assert_eq!(apply(&mut d, &PatchOperation::set("//a:rPr/@sz", "2400"), &ns()).unwrap(), 1);
        assert_eq!(apply(&mut d, &PatchOperation::set("//a:t", "Two"), &ns()).unwrap(), 1);
        let out = d.to_xml_string();
        assert!(out.contains(r#"<a:rPr sz="2400"/>"#));
        assert!(out.contains("<a:t>Two</a:t>"));
    }

    #[test]
    fn test_set_escapes_values() {
        let mut d = doc("<a><b/></a>");
        apply(&mut d, &PatchOperation::set("/a/b", "x < y & z"), &ns()).unwrap();
        assert_eq!(d.to_xml_string(), "<a><b>x &lt; y &amp; z</b></a>");
    }

    #[test]
    fn test_zero_matches() {
        let mut d = doc(SLIDE);
        assert_eq!(apply(&mut d, &PatchOperation::set("//a:missing", "x"), &ns()).unwrap(), 0);

        let err = apply(&mut d, &PatchOperation::set("//a:missing", "x").required(), &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::NoMatch);

        let strict = Applier::new(ApplyOptions { require_matches: true });
        let err = strict
            .apply(&mut d, &PatchOperation::set("//a:missing", "x"), &ns())
            .unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::NoMatch);
    }

    #[test]
    fn test_invalid_target_and_unbound_prefix() {
        let mut d = doc(SLIDE);
        let err = apply(&mut d, &PatchOperation::set("//a:t[", "x"), &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::InvalidTarget);
        let err = apply(&mut d, &PatchOperation::set("//zz:t", "x"), &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::UnboundPrefix);
        let err = apply(&mut d, &PatchOperation::set("count(//a:t)", "x"), &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::InvalidTarget);
    }

    #[test]
    fn test_insert_positions() {
        let base = "<list><item>b</item></list>";
        let cases = [
            (InsertPosition::Append, "/list", "<list><item>b</item><item>x</item></list>"),
            (InsertPosition::Prepend, "/list", "<list><item>x</item><item>b</item></list>"),
            (InsertPosition::Before, "/list/item", "<list><item>x</item><item>b</item></list>"),
            (InsertPosition::After, "/list/item", "<list><item>b</item><item>x</item></list>"),
        ];
        for (position, target, expected) in cases {
            let mut d = doc(base);
            let op = PatchOperation::insert(target, "<item>x</item>", position);
            assert_eq!(apply(&mut d, &op, &ns()).unwrap(), 1);
            assert_eq!(d.to_xml_string(), expected, "{:?}", position);
        }
    }

    #[test]
    fn test_insert_multi_root_fragment_keeps_order() {
        let mut d = doc("<l><m/></l>");
        let op = PatchOperation::insert("/l/m", "<a/><b/>", InsertPosition::After);
        apply(&mut d, &op, &ns()).unwrap();
        assert_eq!(d.to_xml_string(), "<l><m/><a/><b/></l>");

        let mut d = doc("<l><m/></l>");
        let op = PatchOperation::insert("/l", "<a/><b/>", InsertPosition::Prepend);
        apply(&mut d, &op, &ns()).unwrap();
        assert_eq!(d.to_xml_string(), "<l><a/><b/><m/></l>");
    }

    #[test]
    fn test_insert_inherits_ambient_namespaces() {
        let mut d = doc(SLIDE);
        let op = PatchOperation::insert("//a:p", "<a:r><a:t>Added</a:t></a:r>", InsertPosition::Append);
        apply(&mut d, &op, &ns()).unwrap();
        let out = d.to_xml_string();
        assert!(out.contains("<a:r><a:t>Added</a:t></a:r></a:p>"));
        // No redundant declaration when the prefix is already in scope.
        assert!(!out.contains("<a:r xmlns:a="));
        let texts = crate::xml::XPath::parse("//a:t").unwrap().select(&d, &ns()).unwrap();
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn test_insert_declares_prefix_from_namespace_map() {
        let mut d = doc(SLIDE);
        let op = PatchOperation::insert("//p:sp", "<t:ext uri=\"x\"/>", InsertPosition::Append)
            .with_namespace("t", "urn:test");
        let map = op.namespace_map(&ns());
        apply(&mut d, &op, &map).unwrap();
        assert!(d.to_xml_string().contains(r#"<t:ext xmlns:t="urn:test" uri="x"/>"#));
    }

    #[test]
    fn test_insert_unbound_fragment_prefix() {
        let mut d = doc(SLIDE);
        let before = d.to_xml_string();
        let op = PatchOperation::insert("//p:sp", "<qq:x/>", InsertPosition::Append);
        let err = apply(&mut d, &op, &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::UnboundPrefix);
        assert_eq!(d.to_xml_string(), before);
    }

    #[test]
    fn test_malformed_fragment_leaves_tree_untouched() {
        let mut d = doc("<l><m/><m/></l>");
        let before = d.to_xml_string();
        let op = PatchOperation::insert("/l/m", "<broken>", InsertPosition::Append);
        let err = apply(&mut d, &op, &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::FragmentParse);
        assert_eq!(d.to_xml_string(), before);
    }

    #[test]
    fn test_insert_structural_conflicts() {
        let mut d = doc("<l a=\"1\"/>");
        let op = PatchOperation::insert("/l", "<x/>", InsertPosition::Before);
        assert_eq!(apply(&mut d, &op, &ns()).unwrap_err().kind, ApplyErrorKind::StructuralConflict);
        let op = PatchOperation::insert("/l/@a", "<x/>", InsertPosition::Append);
        assert_eq!(apply(&mut d, &op, &ns()).unwrap_err().kind, ApplyErrorKind::StructuralConflict);
    }

    #[test]
    fn test_extend_appends_in_order() {
        let mut d = doc("<l/>");
        let op = PatchOperation::new(
            Operation::Extend {
                fragments: vec!["<a/>".into(), "<b/>".into(), "<c/>".into()],
            },
            "/l",
        );
        assert_eq!(apply(&mut d, &op, &ns()).unwrap(), 1);
        assert_eq!(d.to_xml_string(), "<l><a/><b/><c/></l>");
    }

    #[test]
    fn test_extend_fails_atomically() {
        let mut d = doc("<l/>");
        let op = PatchOperation::new(
            Operation::Extend {
                fragments: vec!["<a/>".into(), "<b".into()],
            },
            "/l",
        );
        assert_eq!(apply(&mut d, &op, &ns()).unwrap_err().kind, ApplyErrorKind::FragmentParse);
        assert_eq!(d.to_xml_string(), "<l/>");
    }

    #[test]
    fn test_merge_is_non_destructive() {
        let mut d = doc(r#"<cfg mode="a"><keep>1</keep><opt>old</opt></cfg>"#);
        let entries: PatchValue = serde_saphyr::from_str(
            "\"@mode\": b\n\"@extra\": 2\nopt: new\nnested:\n  leaf: v\n  \"@flag\": \"true\"\n",
        )
        .unwrap();
        let op = PatchOperation::new(
            Operation::Merge {
                entries: entries.as_mapping().unwrap().clone(),
            },
            "/cfg",
        );
        assert_eq!(apply(&mut d, &op, &ns()).unwrap(), 1);
        assert_eq!(
            d.to_xml_string(),
            r#"<cfg mode="b" extra="2"><keep>1</keep><opt>new</opt><nested flag="true"><leaf>v</leaf></nested></cfg>"#
        );
    }

    #[test]
    fn test_merge_prefixed_keys() {
        let mut d = doc(SLIDE);
        let entries: PatchValue =
            serde_saphyr::from_str("a:rPr:\n  \"@b\": \"1\"\na:endParaRPr: null\n").unwrap();
        let op = PatchOperation::new(
            Operation::Merge {
                entries: entries.as_mapping().unwrap().clone(),
            },
            "//a:r",
        );
        apply(&mut d, &op, &ns()).unwrap();
        let out = d.to_xml_string();
        assert!(out.contains(r#"<a:rPr sz="1800" b="1"/>"#), "{}", out);
        assert!(out.contains("<a:endParaRPr/>"));
    }

    #[test]
    fn test_merge_rejects_sequences() {
        let mut d = doc("<cfg/>");
        let mut entries = indexmap::IndexMap::new();
        entries.insert("x".to_string(), PatchValue::Sequence(vec![]));
        let op = PatchOperation::new(Operation::Merge { entries }, "/cfg");
        assert_eq!(apply(&mut d, &op, &ns()).unwrap_err().kind, ApplyErrorKind::InvalidValue);
    }

    #[test]
    fn test_rels_add() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t" Target="slides/slide1.xml"/></Relationships>"#;
        let mut d = doc(rels);
        let op = PatchOperation::new(
            Operation::RelationshipAdd {
                relationship: RelationshipSpec {
                    id: "rId2".into(),
                    reltype: "http://example.com/link".into(),
                    target: "https://example.com".into(),
                    target_mode: Some("External".into()),
                },
            },
            "/rel:Relationships",
        );
        assert_eq!(apply(&mut d, &op, &ns()).unwrap(), 1);
        assert!(d.to_xml_string().contains(
            r#"<Relationship Id="rId2" Type="http://example.com/link" Target="https://example.com" TargetMode="External"/></Relationships>"#
        ));
        let parsed = crate::opc::parse_relationships(&d.to_xml_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);

        let err = apply(&mut d, &op, &ns()).unwrap_err();
        assert_eq!(err.kind, ApplyErrorKind::DuplicateRelationshipId);
    }

    #[test]
    fn test_plan_then_execute() {
        let d0 = doc("<a><b/><b/></a>");
        let applier = Applier::default();
        let plan = applier.plan(&d0, &PatchOperation::set("//b/@x", "1"), &ns()).unwrap();
        // Attributes that do not exist select nothing.
        assert!(plan.is_empty());
        let plan = applier.plan(&d0, &PatchOperation::set("//b", "t"), &ns()).unwrap();
        assert_eq!(plan.len(), 2);
        let mut d = d0.clone();
        assert_eq!(applier.execute(&mut d, plan), 2);
        assert_eq!(d.to_xml_string(), "<a><b>t</b><b>t</b></a>");
    }
}
