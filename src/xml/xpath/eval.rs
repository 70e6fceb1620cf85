//! Expression evaluation.

use super::XPathError;
use super::parser::{Axis, BinaryOp, Expr, NodeTest, Step};
use crate::common::value::format_number;
use crate::xml::dom::{NodeId, NodeKind, QName, XmlDocument};
use crate::xml::namespace::NamespaceMap;

/// A node selected by an XPath expression.
///
/// Attributes are addressed by their owning element and literal name so a
/// selection stays meaningful while the tree is being modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum XNode {
    Node(NodeId),
    Attribute { element: NodeId, name: QName },
}

impl XNode {
    /// The tree node, or the owning element for attributes.
    pub fn node_id(&self) -> NodeId {
        match self {
            XNode::Node(id) => *id,
            XNode::Attribute { element, .. } => *element,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, XNode::Attribute { .. })
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    NodeSet(Vec<XNode>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::NodeSet(_) => "node-set",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }
}

#[derive(Debug, Clone)]
struct Context {
    node: XNode,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    doc: &'a XmlDocument,
    namespaces: &'a NamespaceMap,
    order: Vec<usize>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(doc: &'a XmlDocument, namespaces: &'a NamespaceMap) -> Self {
        Self {
            doc,
            namespaces,
            order: doc.document_order(),
        }
    }

    pub(crate) fn evaluate(&self, expr: &Expr, context: XNode) -> Result<Value, XPathError> {
        let mut prefixes = Vec::new();
        collect_prefixes(expr, &mut prefixes);
        if let Some(unbound) = prefixes.into_iter().find(|p| self.namespaces.get(p).is_none()) {
            return Err(XPathError::UnboundPrefix(unbound));
        }
        let ctx = Context {
            node: context,
            position: 1,
            size: 1,
        };
        self.eval(expr, &ctx)
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Negate(inner) => Ok(Value::Number(-self.number(&self.eval(inner, ctx)?))),
            Expr::Function(name, args) => self.call(name, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Node(self.doc.root())
                } else {
                    ctx.node.clone()
                };
                Ok(Value::NodeSet(self.apply_steps(vec![start], steps)?))
            },
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = match self.eval(primary, ctx)? {
                    Value::NodeSet(nodes) => nodes,
                    other => {
                        return Err(XPathError::Type(format!(
                            "cannot filter or navigate from a {}",
                            other.type_name()
                        )));
                    },
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::NodeSet(self.apply_steps(nodes, steps)?))
            },
            Expr::Binary(op, left, right) => self.binary(*op, left, right, ctx),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match op {
            BinaryOp::Or => {
                let l = self.boolean(&self.eval(left, ctx)?);
                Ok(Value::Boolean(l || self.boolean(&self.eval(right, ctx)?)))
            },
            BinaryOp::And => {
                let l = self.boolean(&self.eval(left, ctx)?);
                Ok(Value::Boolean(l && self.boolean(&self.eval(right, ctx)?)))
            },
            BinaryOp::Union => {
                let (Value::NodeSet(mut l), Value::NodeSet(r)) = (self.eval(left, ctx)?, self.eval(right, ctx)?)
                else {
                    return Err(XPathError::Type("'|' requires node-sets on both sides".to_string()));
                };
                l.extend(r);
                self.sort_unique(&mut l);
                Ok(Value::NodeSet(l))
            },
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let l = self.eval(left, ctx)?;
                let r = self.eval(right, ctx)?;
                Ok(Value::Boolean(self.compare(op, &l, &r)))
            },
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.number(&self.eval(left, ctx)?);
                let r = self.number(&self.eval(right, ctx)?);
                Ok(Value::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            },
        }
    }

    // ------------------------------------------------------------------
    // Location steps
    // ------------------------------------------------------------------

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, XPathError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut candidates: Vec<XNode> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|c| self.test(c, &step.test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            self.sort_unique(&mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Number(n) => n == ctx.position as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(ctx.node);
            }
        }
        Ok(kept)
    }

    /// Nodes on `axis` from `node`, in proximity order.
    fn axis(&self, node: &XNode, axis: Axis) -> Vec<XNode> {
        let doc = self.doc;
        let id = match node {
            XNode::Node(id) => *id,
            XNode::Attribute { element, .. } => {
                return match axis {
                    Axis::SelfAxis => vec![node.clone()],
                    Axis::Parent => vec![XNode::Node(*element)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node.clone());
                        }
                        out.extend(self.ancestors(*element, true));
                        out
                    },
                    Axis::Following => {
                        let mut out: Vec<XNode> =
                            doc.descendants(*element).into_iter().skip(1).map(XNode::Node).collect();
                        out.extend(self.axis(&XNode::Node(*element), Axis::Following));
                        out
                    },
                    Axis::Preceding => self.axis(&XNode::Node(*element), Axis::Preceding),
                    _ => Vec::new(),
                };
            },
        };

        match axis {
            Axis::Child => doc.children(id).iter().copied().map(XNode::Node).collect(),
            Axis::Descendant => doc.descendants(id).into_iter().skip(1).map(XNode::Node).collect(),
            Axis::DescendantOrSelf => doc.descendants(id).into_iter().map(XNode::Node).collect(),
            Axis::SelfAxis => vec![XNode::Node(id)],
            Axis::Parent => doc.parent(id).map(XNode::Node).into_iter().collect(),
            Axis::Attribute => doc
                .element(id)
                .map(|e| {
                    e.attributes
                        .iter()
                        .map(|a| XNode::Attribute {
                            element: id,
                            name: a.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Axis::Ancestor => self.ancestors(id, false),
            Axis::AncestorOrSelf => self.ancestors(id, true),
            Axis::FollowingSibling => self.siblings(id, true),
            Axis::PrecedingSibling => self.siblings(id, false),
            Axis::Following => {
                let mut out = Vec::new();
                let mut current = Some(id);
                while let Some(node) = current {
                    for sibling in self.siblings(node, true) {
                        out.extend(doc.descendants(sibling.node_id()).into_iter().map(XNode::Node));
                    }
                    current = doc.parent(node);
                }
                out
            },
            Axis::Preceding => {
                let target = self.order[id.index()];
                let ancestors = self.ancestors(id, false);
                let mut out: Vec<XNode> = doc
                    .descendants(doc.root())
                    .into_iter()
                    .filter(|n| self.order[n.index()] < target)
                    .map(XNode::Node)
                    .filter(|n| !ancestors.contains(n))
                    .collect();
                out.reverse();
                out
            },
        }
    }

    fn ancestors(&self, id: NodeId, include_self: bool) -> Vec<XNode> {
        let mut out = Vec::new();
        let mut current = if include_self { Some(id) } else { self.doc.parent(id) };
        while let Some(node) = current {
            out.push(XNode::Node(node));
            current = self.doc.parent(node);
        }
        out
    }

    fn siblings(&self, id: NodeId, following: bool) -> Vec<XNode> {
        let Some(parent) = self.doc.parent(id) else {
            return Vec::new();
        };
        let children = self.doc.children(parent);
        let Some(index) = children.iter().position(|&c| c == id) else {
            return Vec::new();
        };
        if following {
            children[index + 1..].iter().copied().map(XNode::Node).collect()
        } else {
            children[..index].iter().rev().copied().map(XNode::Node).collect()
        }
    }

    fn test(&self, node: &XNode, test: &NodeTest, axis: Axis) -> bool {
        let principal_attribute = axis == Axis::Attribute;
        match node {
            XNode::Attribute { element, name } => {
                if !principal_attribute {
                    return matches!(test, NodeTest::Node);
                }
                match test {
                    NodeTest::Node | NodeTest::Any => true,
                    NodeTest::AnyInNamespace(p) => {
                        let uri = self.doc.attribute_namespace(*element, name);
                        uri.is_some() && uri == self.namespaces.get(p)
                    },
                    NodeTest::Name(p, local) => {
                        let uri = self.doc.attribute_namespace(*element, name);
                        self.name_matches(p.as_deref(), local, name, uri, true)
                    },
                    _ => false,
                }
            },
            XNode::Node(id) => match (self.doc.kind(*id), test) {
                (_, NodeTest::Node) => true,
                (NodeKind::Text(_) | NodeKind::CData(_), NodeTest::Text) => true,
                (NodeKind::Comment(_), NodeTest::Comment) => true,
                (NodeKind::ProcessingInstruction(_), NodeTest::ProcessingInstruction) => true,
                (NodeKind::Element(_), _) if principal_attribute => false,
                (NodeKind::Element(_), NodeTest::Any) => true,
                (NodeKind::Element(_), NodeTest::AnyInNamespace(p)) => {
                    let uri = self.doc.element_namespace(*id);
                    uri.is_some() && uri == self.namespaces.get(p)
                },
                (NodeKind::Element(e), NodeTest::Name(p, local)) => {
                    let uri = self.doc.element_namespace(*id);
                    self.name_matches(p.as_deref(), local, &e.name, uri, false)
                },
                _ => false,
            },
        }
    }

    fn name_matches(
        &self,
        prefix: Option<&str>,
        local: &str,
        node_name: &QName,
        node_uri: Option<&str>,
        attribute: bool,
    ) -> bool {
        if node_name.local != local {
            return false;
        }
        let expected = match prefix {
            Some(p) => self.namespaces.get(p),
            None if attribute => None,
            None => self.namespaces.default_namespace(),
        };
        match (node_uri, node_name.prefix()) {
            // Prefix undeclared in the document itself: fall back to literal prefixes.
            (None, Some(node_prefix)) => prefix == Some(node_prefix),
            _ => node_uri == expected,
        }
    }

    fn sort_unique(&self, nodes: &mut Vec<XNode>) {
        nodes.sort_by_key(|n| self.order_key(n));
        nodes.dedup();
    }

    fn order_key(&self, node: &XNode) -> (usize, usize, usize) {
        match node {
            XNode::Node(id) => (self.order[id.index()], 0, 0),
            XNode::Attribute { element, name } => {
                let index = self
                    .doc
                    .element(*element)
                    .and_then(|e| e.attributes.iter().position(|a| &a.name == name))
                    .unwrap_or(usize::MAX);
                (self.order[element.index()], 1, index)
            },
        }
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    fn node_string(&self, node: &XNode) -> String {
        match node {
            XNode::Node(id) => self.doc.text_content(*id),
            XNode::Attribute { element, name } => self
                .doc
                .element(*element)
                .and_then(|e| e.attribute(name))
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::NodeSet(nodes) => nodes.first().map(|n| self.node_string(n)).unwrap_or_default(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            },
            other => string_to_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::NodeSet(nodes) => !nodes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::NodeSet(l), Value::NodeSet(r)) => l.iter().any(|a| {
                let a = Value::String(self.node_string(a));
                r.iter()
                    .any(|b| self.compare_atoms(op, &a, &Value::String(self.node_string(b))))
            }),
            (Value::NodeSet(nodes), other) => self.compare_set(op, nodes, other),
            (other, Value::NodeSet(nodes)) => self.compare_set(flip(op), nodes, other),
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn compare_set(&self, op: BinaryOp, nodes: &[XNode], other: &Value) -> bool {
        match other {
            Value::Boolean(_) => self.compare_atoms(op, &Value::Boolean(!nodes.is_empty()), other),
            Value::Number(_) => nodes.iter().any(|n| {
                let v = Value::Number(string_to_number(&self.node_string(n)));
                self.compare_atoms(op, &v, other)
            }),
            _ => nodes
                .iter()
                .any(|n| self.compare_atoms(op, &Value::String(self.node_string(n)), other)),
        }
    }

    fn compare_atoms(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                    self.boolean(left) == self.boolean(right)
                } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                    self.number(left) == self.number(right)
                } else {
                    self.string(left) == self.string(right)
                };
                if op == BinaryOp::Eq { equal } else { !equal }
            },
            _ => {
                let (l, r) = (self.number(left), self.number(right));
                match op {
                    BinaryOp::Lt => l < r,
                    BinaryOp::Le => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // Function library
    // ------------------------------------------------------------------

    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let arity = |expected: &str, ok: bool| -> Result<(), XPathError> {
            if ok {
                Ok(())
            } else {
                Err(XPathError::Arity {
                    name: name.to_string(),
                    expected: expected.to_string(),
                })
            }
        };
        let n = args.len();

        match name {
            "last" => {
                arity("0", n == 0)?;
                Ok(Value::Number(ctx.size as f64))
            },
            "position" => {
                arity("0", n == 0)?;
                Ok(Value::Number(ctx.position as f64))
            },
            "count" => {
                arity("1", n == 1)?;
                Ok(Value::Number(self.node_set_arg(&args[0], ctx)?.len() as f64))
            },
            "local-name" | "name" | "namespace-uri" => {
                arity("0 or 1", n <= 1)?;
                let node = match args.first() {
                    Some(arg) => self.node_set_arg(arg, ctx)?.into_iter().next(),
                    None => Some(ctx.node.clone()),
                };
                Ok(Value::String(node.map(|n| self.name_of(&n, name)).unwrap_or_default()))
            },
            "string" => {
                arity("0 or 1", n <= 1)?;
                Ok(Value::String(self.string_arg(args.first(), ctx)?))
            },
            "concat" => {
                arity("2 or more", n >= 2)?;
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.string(&self.eval(arg, ctx)?));
                }
                Ok(Value::String(out))
            },
            "starts-with" | "ends-with" | "contains" | "substring-before" | "substring-after" => {
                arity("2", n == 2)?;
                let a = self.string(&self.eval(&args[0], ctx)?);
                let b = self.string(&self.eval(&args[1], ctx)?);
                Ok(match name {
                    "starts-with" => Value::Boolean(a.starts_with(&b)),
                    "ends-with" => Value::Boolean(a.ends_with(&b)),
                    "contains" => Value::Boolean(a.contains(&b)),
                    "substring-before" => {
                        Value::String(a.find(&b).map(|i| a[..i].to_string()).unwrap_or_default())
                    },
                    _ => Value::String(
                        a.find(&b)
                            .map(|i| a[i + b.len()..].to_string())
                            .unwrap_or_default(),
                    ),
                })
            },
            "substring" => {
                arity("2 or 3", n == 2 || n == 3)?;
                let s = self.string(&self.eval(&args[0], ctx)?);
                let start = round(self.number(&self.eval(&args[1], ctx)?));
                let end = match args.get(2) {
                    Some(len) => start + round(self.number(&self.eval(len, ctx)?)),
                    None => f64::INFINITY,
                };
                let out = s
                    .chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let p = (*i + 1) as f64;
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                Ok(Value::String(out))
            },
            "string-length" => {
                arity("0 or 1", n <= 1)?;
                Ok(Value::Number(self.string_arg(args.first(), ctx)?.chars().count() as f64))
            },
            "normalize-space" => {
                arity("0 or 1", n <= 1)?;
                let s = self.string_arg(args.first(), ctx)?;
                Ok(Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")))
            },
            "translate" => {
                arity("3", n == 3)?;
                let s = self.string(&self.eval(&args[0], ctx)?);
                let from: Vec<char> = self.string(&self.eval(&args[1], ctx)?).chars().collect();
                let to: Vec<char> = self.string(&self.eval(&args[2], ctx)?).chars().collect();
                let out = s
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(Value::String(out))
            },
            "boolean" => {
                arity("1", n == 1)?;
                Ok(Value::Boolean(self.boolean(&self.eval(&args[0], ctx)?)))
            },
            "not" => {
                arity("1", n == 1)?;
                Ok(Value::Boolean(!self.boolean(&self.eval(&args[0], ctx)?)))
            },
            "true" | "false" => {
                arity("0", n == 0)?;
                Ok(Value::Boolean(name == "true"))
            },
            "number" => {
                arity("0 or 1", n <= 1)?;
                let v = match args.first() {
                    Some(arg) => self.eval(arg, ctx)?,
                    None => Value::NodeSet(vec![ctx.node.clone()]),
                };
                Ok(Value::Number(self.number(&v)))
            },
            "sum" => {
                arity("1", n == 1)?;
                let total = self
                    .node_set_arg(&args[0], ctx)?
                    .iter()
                    .map(|n| string_to_number(&self.node_string(n)))
                    .sum();
                Ok(Value::Number(total))
            },
            "floor" | "ceiling" | "round" => {
                arity("1", n == 1)?;
                let v = self.number(&self.eval(&args[0], ctx)?);
                Ok(Value::Number(match name {
                    "floor" => v.floor(),
                    "ceiling" => v.ceil(),
                    _ => round(v),
                }))
            },
            _ => Err(XPathError::UnknownFunction(name.to_string())),
        }
    }

    fn node_set_arg(&self, arg: &Expr, ctx: &Context) -> Result<Vec<XNode>, XPathError> {
        match self.eval(arg, ctx)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::Type(format!("expected a node-set, found a {}", other.type_name()))),
        }
    }

    fn string_arg(&self, arg: Option<&Expr>, ctx: &Context) -> Result<String, XPathError> {
        Ok(match arg {
            Some(arg) => self.string(&self.eval(arg, ctx)?),
            None => self.node_string(&ctx.node),
        })
    }

    fn name_of(&self, node: &XNode, function: &str) -> String {
        let (name, uri) = match node {
            XNode::Attribute { element, name } => (name, self.doc.attribute_namespace(*element, name)),
            XNode::Node(id) => match self.doc.element(*id) {
                Some(e) => (&e.name, self.doc.element_namespace(*id)),
                None => return String::new(),
            },
        };
        match function {
            "local-name" => name.local.clone(),
            "namespace-uri" => uri.unwrap_or_default().to_string(),
            _ => name.to_string(),
        }
    }
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

fn round(v: f64) -> f64 {
    if v.is_nan() || v.is_infinite() {
        v
    } else {
        (v + 0.5).floor()
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        format_number(n)
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    let digits = t.strip_prefix('-').unwrap_or(t);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

fn collect_prefixes(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Binary(_, l, r) => {
            collect_prefixes(l, out);
            collect_prefixes(r, out);
        },
        Expr::Negate(inner) => collect_prefixes(inner, out),
        Expr::Function(_, args) => args.iter().for_each(|a| collect_prefixes(a, out)),
        Expr::Path { steps, .. } => collect_step_prefixes(steps, out),
        Expr::Filter {
            primary,
            predicates,
            steps,
        } => {
            collect_prefixes(primary, out);
            predicates.iter().for_each(|p| collect_prefixes(p, out));
            collect_step_prefixes(steps, out);
        },
        Expr::Literal(_) | Expr::Number(_) => {},
    }
}

fn collect_step_prefixes(steps: &[Step], out: &mut Vec<String>) {
    for step in steps {
        if let NodeTest::Name(Some(p), _) | NodeTest::AnyInNamespace(p) = &step.test
            && !out.contains(p)
        {
            out.push(p.clone());
        }
        for predicate in &step.predicates {
            collect_prefixes(predicate, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::xml::dom::XmlDocument;
    use crate::xml::namespace::NamespaceMap;
    use crate::xml::xpath::{Value, XNode, XPath, XPathError};

    const DOC: &str = r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><a:p lvl="1"><a:r><a:t>one</a:t></a:r><a:r><a:t>two</a:t></a:r></a:p></p:sp><p:sp><a:p lvl="2"><a:r><a:t>three</a:t></a:r></a:p></p:sp></p:spTree></p:cSld></p:sld>"#;

    fn doc() -> XmlDocument {
        XmlDocument::parse(DOC.as_bytes()).unwrap()
    }

    fn select(expr: &str) -> Vec<XNode> {
        XPath::parse(expr)
            .unwrap()
            .select(&doc(), &NamespaceMap::with_builtins())
            .unwrap()
    }

    fn eval(expr: &str) -> Value {
        XPath::parse(expr)
            .unwrap()
            .evaluate(&doc(), &NamespaceMap::with_builtins())
            .unwrap()
    }

    #[test]
    fn test_descendant_selection_in_document_order() {
        let d = doc();
        let hits = select("//a:t");
        let texts: Vec<String> = hits.iter().map(|n| d.text_content(n.node_id())).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_positional_and_attribute_predicates() {
        assert_eq!(select("//a:r[1]").len(), 2);
        assert_eq!(select("(//a:r)[1]").len(), 1);
        assert_eq!(select("//a:p[@lvl='2']/a:r").len(), 1);
        assert_eq!(select("//p:sp[last()]//a:t").len(), 1);
        let attrs = select("//a:p/@lvl");
        assert_eq!(attrs.len(), 2);
        assert!(attrs[0].is_attribute());
    }

    #[test]
    fn test_prefix_resolution_uses_namespace_map() {
        let mut ns = NamespaceMap::new();
        ns.insert("d", "http://schemas.openxmlformats.org/drawingml/2006/main");
        let hits = XPath::parse("//d:r").unwrap().select(&doc(), &ns).unwrap();
        assert_eq!(hits.len(), 3);

        let err = XPath::parse("//q:r").unwrap().select(&doc(), &ns).unwrap_err();
        assert_eq!(err, XPathError::UnboundPrefix("q".into()));
        assert!(select("//r").is_empty());
    }

    #[test]
    fn test_functions_and_comparisons() {
        assert_eq!(eval("count(//a:r)"), Value::Number(3.0));
        assert_eq!(eval("string(//a:t[2])"), Value::String("two".into()));
        assert_eq!(eval("//a:p/@lvl > 1"), Value::Boolean(true));
        assert_eq!(eval("contains(//p:sp[2], 'thr')"), Value::Boolean(true));
        assert_eq!(eval("local-name(/*)"), Value::String("sld".into()));
        assert_eq!(eval("substring('12345', 2, 3)"), Value::String("234".into()));
        assert_eq!(eval("7 mod 3 + 1"), Value::Number(2.0));
        assert_eq!(select("//a:t[normalize-space(.)='two']").len(), 1);
    }

    #[test]
    fn test_axes() {
        assert_eq!(select("//a:r/following-sibling::a:r").len(), 1);
        assert_eq!(select("//a:t[.='two']/ancestor::p:sp").len(), 1);
        assert_eq!(select("//a:t[.='three']/preceding::a:t").len(), 2);
        assert_eq!(select("/p:sld/..").len(), 1);
        assert_eq!(select("//a:r[1]/text()").len(), 0);
    }

    #[test]
    fn test_non_node_set_rejected_by_select() {
        let err = XPath::parse("1 + 1")
            .unwrap()
            .select(&doc(), &NamespaceMap::new())
            .unwrap_err();
        assert!(matches!(err, XPathError::Type(_)));
    }
}
