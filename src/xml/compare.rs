//! Semantic comparison of XML parts.
//!
//! Elements and attributes are compared by expanded name (namespace URI plus
//! local name), so two parts that bind different prefixes to the same URI are
//! equal. Attribute order, comments and insignificant whitespace are ignored.
//! Children are aligned with a longest-common-subsequence pass over their
//! expanded names; unmatched children are reported as added or removed, each
//! at its own indexed path in the document it belongs to.
//!
//! The similarity score is `2 * matched / (nodes_a + nodes_b)`, where each
//! aligned element pair contributes up to 1.0, less a small penalty when its
//! attributes or text differ.

use crate::xml::dom::{NodeId, NodeKind, QName, XmlDocument};
use crate::xml::error::Result;
use crate::xml::namespace::{XML_NS, canonical_prefix};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Share of an element's credit lost when all of its attributes and text differ.
const CONTENT_PENALTY: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    ElementAdded { path: String, name: String },
    ElementRemoved { path: String, name: String },
    AttributeAdded { path: String, name: String, value: String },
    AttributeRemoved { path: String, name: String, value: String },
    AttributeChanged { path: String, name: String, old: String, new: String },
    TextContentChanged { path: String, old: String, new: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub equal: bool,
    pub similarity: f64,
    pub differences: Vec<Difference>,
}

/// Compare two serialized XML documents.
pub fn compare(a: &[u8], b: &[u8]) -> Result<ComparisonResult> {
    let a = XmlDocument::parse(a)?;
    let b = XmlDocument::parse(b)?;
    Ok(compare_documents(&a, &b))
}

/// Compare two parsed documents.
pub fn compare_documents(a: &XmlDocument, b: &XmlDocument) -> ComparisonResult {
    let left = a.document_element().and_then(|root| Tree::build(a, root));
    let right = b.document_element().and_then(|root| Tree::build(b, root));

    let mut differences = Vec::new();
    let (matched, total) = match (&left, &right) {
        (Some(l), Some(r)) => {
            let total = l.size() + r.size();
            let (lr, rr) = (l.root(), r.root());
            if lr.key == rr.key {
                (diff_trees(l, r, &mut differences), total)
            } else {
                differences.push(Difference::ElementRemoved {
                    path: format!("/{}", lr.display),
                    name: lr.display.clone(),
                });
                differences.push(Difference::ElementAdded {
                    path: format!("/{}", rr.display),
                    name: rr.display.clone(),
                });
                (0.0, total)
            }
        },
        (Some(l), None) => (0.0, l.size()),
        (None, Some(r)) => (0.0, r.size()),
        (None, None) => (0.0, 0),
    };

    let equal = differences.is_empty();
    let similarity = if equal {
        1.0
    } else if total == 0 {
        0.0
    } else {
        (2.0 * matched / total as f64).clamp(0.0, 1.0)
    };

    ComparisonResult {
        equal,
        similarity,
        differences,
    }
}

type ExpandedName = (Option<String>, String);

/// Namespace-resolved view of one element.
#[derive(Debug)]
struct TreeNode {
    key: ExpandedName,
    display: String,
    attributes: BTreeMap<ExpandedName, (String, String)>,
    text: String,
    /// Indices into [`Tree::nodes`]
    children: Vec<usize>,
}

/// Elements of one document in pre-order; the root is at index 0.
#[derive(Debug)]
struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    fn build(doc: &XmlDocument, root: NodeId) -> Option<Tree> {
        doc.element(root)?;
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut stack = vec![(root, None::<usize>, false)];
        while let Some((id, parent, inherited)) = stack.pop() {
            let Some((node, preserve)) = Tree::node(doc, id, inherited) else {
                continue;
            };
            let index = nodes.len();
            nodes.push(node);
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }
            stack.extend(
                doc.children(id)
                    .iter()
                    .rev()
                    .filter(|&&child| doc.is_element(child))
                    .map(|&child| (child, Some(index), preserve)),
            );
        }
        Some(Tree { nodes })
    }

    fn node(doc: &XmlDocument, id: NodeId, preserve: bool) -> Option<(TreeNode, bool)> {
        let element = doc.element(id)?;
        let uri = doc.element_namespace(id).map(str::to_string);
        let display = display_name(uri.as_deref(), &element.name);

        let mut attributes = BTreeMap::new();
        for attr in &element.attributes {
            let uri = doc.attribute_namespace(id, &attr.name).map(str::to_string);
            let shown = display_name(uri.as_deref(), &attr.name);
            attributes.insert((uri, attr.name.local.clone()), (shown, attr.value.clone()));
        }

        let preserve = match element.attribute(&QName::new(Some("xml"), "space")) {
            Some(v) => v == "preserve",
            None => preserve,
        };

        let mut text = String::new();
        for &child in doc.children(id) {
            if let NodeKind::Text(t) | NodeKind::CData(t) = doc.kind(child) {
                text.push_str(t);
            }
        }
        if !preserve {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        let node = TreeNode {
            key: (uri, element.name.local.clone()),
            display,
            attributes,
            text,
            children: Vec::new(),
        };
        Some((node, preserve))
    }

    fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }
}

fn display_name(uri: Option<&str>, name: &QName) -> String {
    match uri {
        Some(XML_NS) => format!("xml:{}", name.local),
        Some(uri) => match canonical_prefix(uri) {
            Some(p) => format!("{}:{}", p, name.local),
            None => format!("{{{}}}{}", uri, name.local),
        },
        None => name.local.clone(),
    }
}

enum Step {
    Pair { a: usize, b: usize, path: String },
    Report(Difference),
}

/// Diff two trees whose roots share an expanded name; returns matched credit.
fn diff_trees(a: &Tree, b: &Tree, out: &mut Vec<Difference>) -> f64 {
    let mut matched = 0.0;
    let mut steps = vec![Step::Pair {
        a: 0,
        b: 0,
        path: format!("/{}", a.root().display),
    }];
    while let Some(step) = steps.pop() {
        match step {
            Step::Report(difference) => out.push(difference),
            Step::Pair { a: ai, b: bi, path } => {
                let (left, right) = (&a.nodes[ai], &b.nodes[bi]);
                matched += diff_content(left, right, &path, out);
                let mut next = child_steps(a, left, b, right, &path);
                next.reverse();
                steps.extend(next);
            },
        }
    }
    matched
}

/// Compare attributes and text of two aligned elements; returns their credit.
fn diff_content(a: &TreeNode, b: &TreeNode, path: &str, out: &mut Vec<Difference>) -> f64 {
    let mut items = 0usize;
    let mut agreement = 0.0;

    for (key, (shown, old)) in &a.attributes {
        items += 1;
        match b.attributes.get(key) {
            Some((_, new)) if new == old => agreement += 1.0,
            Some((_, new)) => {
                agreement += 0.5;
                out.push(Difference::AttributeChanged {
                    path: path.to_string(),
                    name: shown.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            },
            None => out.push(Difference::AttributeRemoved {
                path: path.to_string(),
                name: shown.clone(),
                value: old.clone(),
            }),
        }
    }
    for (key, (shown, value)) in &b.attributes {
        if !a.attributes.contains_key(key) {
            items += 1;
            out.push(Difference::AttributeAdded {
                path: path.to_string(),
                name: shown.clone(),
                value: value.clone(),
            });
        }
    }

    if !a.text.is_empty() || !b.text.is_empty() {
        items += 1;
        if a.text == b.text {
            agreement += 1.0;
        } else {
            out.push(Difference::TextContentChanged {
                path: path.to_string(),
                old: a.text.clone(),
                new: b.text.clone(),
            });
        }
    }

    let content = if items == 0 { 1.0 } else { agreement / items as f64 };
    1.0 - CONTENT_PENALTY * (1.0 - content)
}

/// Removed, added and aligned children of two elements, in document order.
///
/// Child paths index each name among its siblings on the side the child
/// comes from, so `/a/b[2]` is the second `b` of the old or new parent.
fn child_steps(a: &Tree, left: &TreeNode, b: &Tree, right: &TreeNode, path: &str) -> Vec<Step> {
    let left_children: Vec<&TreeNode> = left.children.iter().map(|&i| &a.nodes[i]).collect();
    let right_children: Vec<&TreeNode> = right.children.iter().map(|&i| &b.nodes[i]).collect();
    let left_keys: Vec<&ExpandedName> = left_children.iter().map(|c| &c.key).collect();
    let right_keys: Vec<&ExpandedName> = right_children.iter().map(|c| &c.key).collect();

    let mut old_seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut new_seen: BTreeMap<&str, usize> = BTreeMap::new();

    let mut steps = Vec::new();
    let (mut ai, mut bi) = (0, 0);
    let pairs = align(&left_keys, &right_keys);
    let end = (left_children.len(), right_children.len());
    for (pa, pb) in pairs.into_iter().chain(std::iter::once(end)) {
        while ai < pa {
            let child = left_children[ai];
            steps.push(Step::Report(Difference::ElementRemoved {
                path: indexed_path(&mut old_seen, path, &child.display),
                name: child.display.clone(),
            }));
            ai += 1;
        }
        while bi < pb {
            let child = right_children[bi];
            steps.push(Step::Report(Difference::ElementAdded {
                path: indexed_path(&mut new_seen, path, &child.display),
                name: child.display.clone(),
            }));
            bi += 1;
        }
        if pa < left_children.len() && pb < right_children.len() {
            let p = indexed_path(&mut old_seen, path, &left_children[pa].display);
            indexed_path(&mut new_seen, path, &right_children[pb].display);
            steps.push(Step::Pair {
                a: left.children[pa],
                b: right.children[pb],
                path: p,
            });
            ai = pa + 1;
            bi = pb + 1;
        }
    }
    steps
}

fn indexed_path<'n>(seen: &mut BTreeMap<&'n str, usize>, parent: &str, name: &'n str) -> String {
    let n = seen.entry(name).or_insert(0);
    *n += 1;
    format!("{}/{}[{}]", parent, name, n)
}

/// Cells of the LCS table above which the unmatched middle of two child
/// lists is aligned by name occurrence instead.
const ALIGN_TABLE_LIMIT: usize = 1 << 22;

/// Aligned child index pairs, increasing in both indices.
///
/// Runs of equal names at both ends are paired directly. What remains is
/// aligned by longest common subsequence while the table stays under
/// [`ALIGN_TABLE_LIMIT`] cells.
fn align(a: &[&ExpandedName], b: &[&ExpandedName]) -> Vec<(usize, usize)> {
    let head = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let tail = a[head..]
        .iter()
        .rev()
        .zip(b[head..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (mid_a, mid_b) = (&a[head..a.len() - tail], &b[head..b.len() - tail]);

    let middle = if mid_a.len().saturating_mul(mid_b.len()) <= ALIGN_TABLE_LIMIT {
        lcs(mid_a, mid_b)
    } else {
        occurrence_pairs(mid_a, mid_b)
    };

    let mut pairs: Vec<(usize, usize)> = (0..head).map(|i| (i, i)).collect();
    pairs.extend(middle.into_iter().map(|(i, j)| (i + head, j + head)));
    pairs.extend((0..tail).map(|k| (a.len() - tail + k, b.len() - tail + k)));
    pairs
}

fn lcs(a: &[&ExpandedName], b: &[&ExpandedName]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Pair the k-th occurrence of each name in `a` with its k-th occurrence in
/// `b`, then keep the longest chain of pairs increasing in both indices.
fn occurrence_pairs(a: &[&ExpandedName], b: &[&ExpandedName]) -> Vec<(usize, usize)> {
    let mut positions: HashMap<&ExpandedName, VecDeque<usize>> = HashMap::new();
    for (j, key) in b.iter().enumerate() {
        positions.entry(*key).or_default().push_back(j);
    }
    let candidates: Vec<(usize, usize)> = a
        .iter()
        .enumerate()
        .filter_map(|(i, key)| positions.get_mut(*key).and_then(VecDeque::pop_front).map(|j| (i, j)))
        .collect();

    // Patience sort over the `b` indices.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; candidates.len()];
    for (c, &(_, j)) in candidates.iter().enumerate() {
        let slot = tails.partition_point(|&t| candidates[t].1 < j);
        if slot > 0 {
            prev[c] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(c);
        } else {
            tails[slot] = c;
        }
    }

    let mut pairs = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(c) = cursor {
        pairs.push(candidates[c]);
        cursor = prev[c];
    }
    pairs.reverse();
    pairs
}
