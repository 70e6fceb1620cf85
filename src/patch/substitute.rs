//! `${name}` variable substitution.
//!
//! Unknown names are left verbatim and reported back to the caller.

use crate::common::value::PatchValue;
use indexmap::IndexMap;
use memchr::memmem;

/// Replace every `${name}` in `text` whose name is in `variables`.
///
/// Names with no binding, or bound to a sequence or mapping, are left in
/// place and pushed onto `unresolved`.
pub fn substitute_str(
    text: &str,
    variables: &IndexMap<String, PatchValue>,
    unresolved: &mut Vec<String>,
) -> String {
    let finder = memmem::Finder::new(b"${");
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(found) = finder.find(&bytes[cursor..]) {
        let start = cursor + found;
        let Some(len) = memchr::memchr(b'}', &bytes[start + 2..]) else {
            break;
        };
        let end = start + 2 + len;
        let name = text[start + 2..end].trim();
        out.push_str(&text[cursor..start]);
        match variables.get(name).and_then(PatchValue::as_scalar) {
            Some(value) => out.push_str(&value.to_text()),
            None => {
                if !unresolved.iter().any(|u| u == name) {
                    unresolved.push(name.to_string());
                }
                out.push_str(&text[start..=end]);
            },
        }
        cursor = end + 1;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Substitute through a whole value.
///
/// A string that is exactly one `${name}` reference to a structured
/// variable is replaced by that structure.
pub fn substitute_value(
    value: &PatchValue,
    variables: &IndexMap<String, PatchValue>,
    unresolved: &mut Vec<String>,
) -> PatchValue {
    match value {
        PatchValue::Scalar(_) => {
            if let Some(s) = value.as_str()
                && let Some(name) = whole_reference(s)
                && let Some(bound) = variables.get(name)
                && !matches!(bound, PatchValue::Scalar(_))
            {
                return bound.clone();
            }
            value.map_strings(&mut |s| substitute_str(s, variables, unresolved))
        },
        PatchValue::Sequence(items) => PatchValue::Sequence(
            items
                .iter()
                .map(|v| substitute_value(v, variables, unresolved))
                .collect(),
        ),
        PatchValue::Mapping(map) => PatchValue::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, variables, unresolved)))
                .collect(),
        ),
    }
}

fn whole_reference(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    (!inner.contains('}')).then(|| inner.trim())
}

/// Names referenced by `${...}` placeholders in `text`.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    substitute_str(text, &IndexMap::new(), &mut names);
    names
}
